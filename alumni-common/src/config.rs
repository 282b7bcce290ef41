//! Configuration loading and root folder resolution
//!
//! Configuration comes from a TOML file whose every field has a default, so a
//! missing file never prevents startup. Secrets may also come from the
//! environment, which takes priority over the file.
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. `ALUMNI_ROOT_FOLDER`, then `ALUMNI_ROOT` environment variables
//! 3. `root_folder` key of the TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory name used under the platform config/data directories
pub const APP_DIR_NAME: &str = "alumni-network";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "alumni.db";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "ALUMNI_CONFIG";

// ========================================
// TOML Schema
// ========================================

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Root folder holding the database (overridden by CLI/ENV)
    pub root_folder: Option<PathBuf>,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub geocoding: GeocodingConfig,
    pub email: EmailConfig,
    pub logging: LoggingConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the server binds to
    pub bind_address: String,
    /// Profiles per directory page
    pub page_size: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5780".to_string(),
            page_size: 24,
        }
    }
}

/// How bearer tokens are verified
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Tokens signed with the local shared secret
    #[default]
    Signed,
    /// Tokens verified by the hosted auth provider
    Remote,
    /// No verification; every request acts as a local admin
    Disabled,
}

/// Authentication settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub mode: AuthMode,
    /// Shared secret for signed tokens (generated and stored in the database when absent)
    pub shared_secret: Option<i64>,
    /// Base URL of the hosted auth provider (remote mode)
    pub provider_url: Option<String>,
    /// Emails that are always granted the admin role
    pub admin_emails: Vec<String>,
    /// Lifetime of tokens issued by the CLI
    pub token_ttl_hours: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Signed,
            shared_secret: None,
            provider_url: None,
            admin_emails: Vec::new(),
            token_ttl_hours: 24 * 7,
        }
    }
}

impl AuthConfig {
    /// Case-insensitive membership test against `admin_emails`
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.trim().eq_ignore_ascii_case(email.trim()))
    }
}

/// Geocoding provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub enabled: bool,
    /// Base URL of a Mapbox-compatible forward geocoding API
    pub provider_url: String,
    pub access_token: Option<String>,
    /// Fixed minimum delay between two provider requests
    pub min_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider_url: "https://api.mapbox.com".to_string(),
            access_token: None,
            min_interval_ms: 1000,
            timeout_secs: 10,
        }
    }
}

/// Transactional email provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Base URL of the email provider API
    pub provider_url: String,
    pub api_key: Option<String>,
    pub from_address: String,
    /// Maximum messages per second during bulk sends
    pub per_second: u32,
    /// Log messages instead of sending them
    pub dry_run: bool,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            provider_url: "https://api.resend.com".to_string(),
            api_key: None,
            from_address: "Alumni Network <noreply@example.org>".to_string(),
            per_second: 5,
            dry_run: false,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load the config file if it exists, otherwise fall back to defaults
    ///
    /// A missing file logs a warning; a malformed file is still an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => {
                let config = Self::load(path)?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Some(path) => {
                warn!(
                    "Config file {} not found, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                warn!("No config file location available, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Write configuration back to disk (used by `init-config`)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize config failed: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Locate the config file: CLI argument > `ALUMNI_CONFIG` > platform config dir
pub fn config_file_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.toml"))
}

// ========================================
// Secrets
// ========================================

/// Validate a secret value (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve a secret with ENV > TOML priority
///
/// Warns when both sources hold a value, since the TOML value is then ignored.
pub fn resolve_secret(name: &str, env_var: &str, toml_value: Option<&str>) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| is_valid_key(v));
    let toml_value = toml_value.filter(|v| is_valid_key(v));

    match (env_value, toml_value) {
        (Some(env), Some(_)) => {
            warn!(
                "{} found in both {} and TOML config. Using environment (highest priority).",
                name, env_var
            );
            Some(env.trim().to_string())
        }
        (Some(env), None) => {
            info!("{} loaded from environment variable", name);
            Some(env.trim().to_string())
        }
        (None, Some(toml)) => {
            info!("{} loaded from TOML config", name);
            Some(toml.trim().to_string())
        }
        (None, None) => None,
    }
}

// ========================================
// Root Folder
// ========================================

/// OS-dependent compiled defaults
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        // ~/.local/share/alumni-network, ~/Library/Application Support/alumni-network,
        // %LOCALAPPDATA%\alumni-network
        let root_folder = dirs::data_local_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("./alumni_data"));

        Self {
            root_folder,
            log_level: "info".to_string(),
        }
    }
}

/// Resolves the root folder following the documented priority order
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    config_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            config_root: None,
        }
    }

    /// Command-line override
    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    /// Root folder named by the loaded TOML config
    pub fn with_config(mut self, config: &TomlConfig) -> Self {
        self.config_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!("{}: root folder from command line", self.module_name);
            return path.clone();
        }

        for var in ["ALUMNI_ROOT_FOLDER", "ALUMNI_ROOT"] {
            if let Ok(path) = std::env::var(var) {
                if !path.trim().is_empty() {
                    info!("{}: root folder from {}", self.module_name, var);
                    return PathBuf::from(path);
                }
            }
        }

        if let Some(path) = &self.config_root {
            info!("{}: root folder from config file", self.module_name);
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Prepares the root folder on disk
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder if missing (idempotent)
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = TomlConfig::default();
        assert_eq!(config.server.page_size, 24);
        assert_eq!(config.auth.mode, AuthMode::Signed);
        assert_eq!(config.geocoding.min_interval_ms, 1000);
        assert!(config.geocoding.enabled);
        assert_eq!(config.email.per_second, 5);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [geocoding]
            access_token = "pk.test"

            [auth]
            mode = "remote"
            provider_url = "https://auth.example.org"
            "#,
        )
        .unwrap();

        assert_eq!(config.geocoding.access_token.as_deref(), Some("pk.test"));
        assert_eq!(config.geocoding.min_interval_ms, 1000);
        assert_eq!(config.auth.mode, AuthMode::Remote);
        assert_eq!(config.server.bind_address, "127.0.0.1:5780");
    }

    #[test]
    fn test_admin_email_match_ignores_case() {
        let auth = AuthConfig {
            admin_emails: vec!["Dean@Example.org".to_string()],
            ..Default::default()
        };
        assert!(auth.is_admin_email("dean@example.org"));
        assert!(!auth.is_admin_email("someone@example.org"));
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }
}
