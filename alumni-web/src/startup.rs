//! Process startup shared by the binaries
//!
//! Config loading, database opening and construction of the auth, geocoding
//! and email providers from configuration plus environment secrets.

use alumni_common::config::{
    config_file_path, resolve_secret, AuthMode, RootFolderInitializer, RootFolderResolver,
    TomlConfig,
};
use alumni_common::db::{init_database, load_or_init_shared_secret};
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{AuthProvider, DisabledAuthProvider, RemoteAuthProvider, SignedTokenProvider};
use crate::email::{EmailProvider, HttpEmailProvider, LogEmailProvider};
use crate::geocode::{DisabledGeocoder, Geocoder, HttpGeocoder};

pub const AUTH_SECRET_ENV: &str = "ALUMNI_AUTH_SECRET";
pub const GEOCODING_TOKEN_ENV: &str = "ALUMNI_GEOCODING_TOKEN";
pub const EMAIL_API_KEY_ENV: &str = "ALUMNI_EMAIL_API_KEY";

/// Load the TOML config named on the command line, by env, or the platform default
pub fn load_config(cli_path: Option<&Path>) -> Result<TomlConfig> {
    let path = config_file_path(cli_path);
    Ok(TomlConfig::load_or_default(path.as_deref())?)
}

/// Resolve the root folder and open (creating if needed) the database
pub async fn open_database(
    module: &str,
    root_folder: Option<PathBuf>,
    config: &TomlConfig,
) -> Result<SqlitePool> {
    let root_folder = RootFolderResolver::new(module)
        .with_cli_arg(root_folder)
        .with_config(config)
        .resolve();

    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());

    init_database(&db_path)
        .await
        .with_context(|| format!("Opening database {}", db_path.display()))
}

/// Shared secret for signed tokens: ENV > TOML > generated and stored in the database
pub async fn shared_secret(pool: &SqlitePool, config: &TomlConfig) -> Result<i64> {
    let toml_value = config.auth.shared_secret.map(|s| s.to_string());
    if let Some(value) = resolve_secret("Auth shared secret", AUTH_SECRET_ENV, toml_value.as_deref()) {
        let secret: i64 = value
            .parse()
            .map_err(|_| anyhow!("{} must be a 64-bit integer", AUTH_SECRET_ENV))?;
        if secret == 0 {
            bail!("Auth shared secret must be non-zero");
        }
        return Ok(secret);
    }
    Ok(load_or_init_shared_secret(pool).await?)
}

/// Expiry (unix seconds) of a token issued at `now` living `ttl_hours`
pub fn token_expiry(now: DateTime<Utc>, ttl_hours: u64) -> Result<i64> {
    if ttl_hours == 0 {
        bail!("Token lifetime must be at least one hour");
    }
    i64::try_from(ttl_hours)
        .ok()
        .and_then(Duration::try_hours)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .map(|exp| exp.timestamp())
        .ok_or_else(|| anyhow!("Token lifetime of {} hours is out of range", ttl_hours))
}

pub async fn build_auth_provider(
    pool: &SqlitePool,
    config: &TomlConfig,
) -> Result<Arc<dyn AuthProvider>> {
    let provider: Arc<dyn AuthProvider> = match config.auth.mode {
        AuthMode::Signed => {
            info!("Authentication: signed tokens");
            Arc::new(SignedTokenProvider::new(shared_secret(pool, config).await?))
        }
        AuthMode::Remote => {
            let url = config
                .auth
                .provider_url
                .as_deref()
                .ok_or_else(|| anyhow!("auth.provider_url is required in remote mode"))?;
            info!("Authentication: remote provider at {}", url);
            Arc::new(RemoteAuthProvider::new(url)?)
        }
        AuthMode::Disabled => {
            warn!("Authentication DISABLED: every request acts as a local admin");
            Arc::new(DisabledAuthProvider)
        }
    };
    Ok(provider)
}

/// Geocoding access token: ENV > TOML
pub fn resolve_geocoding_token(config: &TomlConfig) -> Option<String> {
    resolve_secret(
        "Geocoding token",
        GEOCODING_TOKEN_ENV,
        config.geocoding.access_token.as_deref(),
    )
}

pub fn build_geocoder(config: &TomlConfig) -> Result<Arc<dyn Geocoder>> {
    if !config.geocoding.enabled {
        info!("Geocoding disabled by configuration");
        return Ok(Arc::new(DisabledGeocoder));
    }
    match resolve_geocoding_token(config) {
        Some(token) => Ok(Arc::new(HttpGeocoder::new(&config.geocoding, token)?)),
        None => {
            warn!(
                "No geocoding token ({} or geocoding.access_token); profiles stay pending",
                GEOCODING_TOKEN_ENV
            );
            Ok(Arc::new(DisabledGeocoder))
        }
    }
}

pub fn build_email_provider(config: &TomlConfig) -> Result<Arc<dyn EmailProvider>> {
    if config.email.dry_run {
        info!("Email dry run: messages are logged, not sent");
        return Ok(Arc::new(LogEmailProvider::new()));
    }
    match resolve_secret("Email API key", EMAIL_API_KEY_ENV, config.email.api_key.as_deref()) {
        Some(key) => Ok(Arc::new(HttpEmailProvider::new(&config.email, key)?)),
        None => {
            warn!(
                "No email API key ({} or email.api_key); messages are logged, not sent",
                EMAIL_API_KEY_ENV
            );
            Ok(Arc::new(LogEmailProvider::new()))
        }
    }
}
