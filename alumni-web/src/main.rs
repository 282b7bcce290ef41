//! alumni-web - Alumni directory service
//!
//! `serve` (default) runs the HTTP service; the other subcommands are small
//! operator tools sharing the same config and database.

use alumni_common::config::{config_file_path, write_toml_config, AuthMode, TomlConfig};
use alumni_common::db::Role;
use alumni_common::token::{issue_token, TokenClaims};
use alumni_web::db::{jobs, users};
use alumni_web::startup::{self, build_auth_provider, build_email_provider, build_geocoder};
use alumni_web::{build_router, AppState};
use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use std::time::Duration;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

/// How long running jobs get to record their cancellation on shutdown
const JOB_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "alumni-web")]
#[command(about = "Alumni network directory and admin console")]
#[command(version)]
struct Cli {
    /// Config file (default: ALUMNI_CONFIG, then the platform config dir)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Folder holding the database
    #[arg(long, global = true, value_name = "DIR")]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (default)
    Serve {
        /// Bind address, overriding server.bind_address
        #[arg(long)]
        bind: Option<String>,
    },

    /// Print a signed session token (signed auth mode only)
    IssueToken {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
        /// Stable user id (default: a new UUID)
        #[arg(long)]
        user_id: Option<String>,
        /// Token lifetime (default: auth.token_ttl_hours)
        #[arg(long)]
        ttl_hours: Option<u64>,
    },

    /// Grant the admin role to an existing user
    Promote {
        #[arg(long)]
        email: String,
    },

    /// Write a default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = config_file_path(cli.config.as_deref());
    let config = startup::load_config(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .init();

    info!(
        "Starting alumni-web v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) if path.exists() => info!("Configuration: {}", path.display()),
        _ => info!("Configuration: built-in defaults"),
    }

    match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => serve(config, cli.root_folder, bind).await,
        Command::IssueToken {
            email,
            name,
            user_id,
            ttl_hours,
        } => {
            if config.auth.mode != AuthMode::Signed {
                bail!("issue-token requires auth.mode = \"signed\"");
            }
            let pool = startup::open_database("alumni-web", cli.root_folder, &config).await?;
            let secret = startup::shared_secret(&pool, &config).await?;
            let ttl = ttl_hours.unwrap_or(config.auth.token_ttl_hours);
            let claims = TokenClaims {
                sub: user_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                email,
                name,
                exp: startup::token_expiry(Utc::now(), ttl)?,
            };
            let token = issue_token(&claims, secret)?;
            info!(user_id = %claims.sub, ttl_hours = ttl, "Issued token");
            println!("{}", token);
            Ok(())
        }
        Command::Promote { email } => {
            let pool = startup::open_database("alumni-web", cli.root_folder, &config).await?;
            let user = users::find_user_by_email(&pool, &email)
                .await?
                .ok_or_else(|| anyhow!("No user with email {} (they must sign in once first)", email))?;
            users::set_role(&pool, &user.id, Role::Admin).await?;
            info!(user_id = %user.id, "Promoted {} to admin", email);
            println!("{} is now an admin", email);
            Ok(())
        }
        Command::InitConfig { force } => {
            let path = config_path.ok_or_else(|| anyhow!("No config location; pass --config"))?;
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            write_toml_config(&TomlConfig::default(), &path)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

async fn serve(config: TomlConfig, root_folder: Option<PathBuf>, bind: Option<String>) -> Result<()> {
    let pool = startup::open_database("alumni-web", root_folder, &config).await?;
    info!("✓ Database ready");

    let interrupted = jobs::fail_interrupted_jobs(&pool).await?;
    if interrupted > 0 {
        warn!("Marked {} interrupted job(s) as failed", interrupted);
    }

    let auth = build_auth_provider(&pool, &config).await?;
    let geocoder = build_geocoder(&config)?;
    let email = build_email_provider(&config)?;

    let bind = bind.unwrap_or_else(|| config.server.bind_address.clone());
    let state = AppState::new(pool, config, auth, geocoder, email);
    let job_registry = state.jobs.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;
    info!("alumni-web listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    job_registry.shutdown(JOB_SHUTDOWN_TIMEOUT).await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
