//! Geocode backfill
//!
//! Runs the fallback geocoder over stored profiles without the web service.
//!
//! ```bash
//! backfill-geocodes [--scope pending|missing|failed|all] [--limit N] [--dry-run]
//! ```

use alumni_web::db::{profiles, GeocodeScope};
use alumni_web::services::regeocode::geocode_profiles;
use alumni_web::startup;
use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "backfill-geocodes")]
#[command(about = "Geocode stored alumni profiles")]
struct Args {
    #[arg(long, value_name = "DIR")]
    root_folder: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Which profiles to process
    #[arg(long, default_value = "missing")]
    scope: GeocodeScope,

    /// Process at most N profiles
    #[arg(long)]
    limit: Option<i64>,

    /// Look up coordinates without saving them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = startup::load_config(args.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .init();

    if !config.geocoding.enabled {
        bail!("Geocoding is disabled in the configuration");
    }
    if startup::resolve_geocoding_token(&config).is_none() {
        bail!(
            "No geocoding token: set {} or geocoding.access_token",
            startup::GEOCODING_TOKEN_ENV
        );
    }
    let geocoder = startup::build_geocoder(&config)?;

    let pool = startup::open_database("backfill-geocodes", args.root_folder, &config).await?;
    let selected = profiles::select_for_geocoding(&pool, args.scope, args.limit).await?;
    info!(
        scope = ?args.scope,
        count = selected.len(),
        dry_run = args.dry_run,
        "Backfilling geocodes"
    );

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current profile");
            ctrl_c_token.cancel();
        }
    });

    let summary = geocode_profiles(
        &pool,
        geocoder.as_ref(),
        None,
        &selected,
        &cancel,
        None,
        args.dry_run,
    )
    .await?;

    println!(
        "Processed {}/{}: {} located, {} failed, {} skipped{}{}",
        summary.processed,
        summary.total,
        summary.located,
        summary.failed,
        summary.skipped,
        if summary.cancelled { " (cancelled)" } else { "" },
        if args.dry_run { " [dry run]" } else { "" },
    );
    Ok(())
}
