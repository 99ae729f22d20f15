//! Configuration file handling for shelfscan.
//!
//! Loads configuration from `<config dir>/shelfscan/config.toml` or a custom
//! path, then applies environment overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::{RetryPolicy, DEFAULT_API_BASE_URL, LIBRARY_API_TOKEN_ENV, LIBRARY_API_URL_ENV};
use crate::scanner::{ScannerSettings, STDIN_DEVICE};
use crate::session::SessionConfig;

/// Configuration file structure for shelfscan.
/// Loaded from `<config dir>/shelfscan/config.toml` (or custom path via --config).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub session: SessionSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Bearer token. Usually supplied through the environment instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            token: None,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_attempts(self.retry_attempts)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScannerConfig {
    /// Device path, or `-` for standard input
    #[serde(default = "default_device")]
    pub device: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
        }
    }
}

impl ScannerConfig {
    pub fn settings(&self) -> ScannerSettings {
        ScannerSettings::with_device(self.device.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SessionSettings {
    #[serde(default = "default_notice_secs")]
    pub notice_secs: u64,
    #[serde(default)]
    pub concurrent_lookups: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            notice_secs: default_notice_secs(),
            concurrent_lookups: false,
        }
    }
}

impl SessionSettings {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            notice_ttl: Duration::from_secs(self.notice_secs),
            concurrent_lookups: self.concurrent_lookups,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_device() -> String {
    STDIN_DEVICE.to_string()
}

fn default_notice_secs() -> u64 {
    3
}

/// Commented default configuration written by `config init`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# shelfscan configuration

[api]
# Library service base URL (env: SHELFSCAN_API_URL)
base_url = "https://api.virtuallibrary.com"
# Per-request timeout in seconds
timeout_secs = 10
# Attempts per request, first try included
retry_attempts = 3
# Bearer token; prefer the SHELFSCAN_TOKEN environment variable
# token = ""

[scanner]
# "-" reads codes from standard input, otherwise a device path
# such as /dev/hidraw0 or /dev/ttyACM0
device = "-"

[session]
# Seconds a notice stays visible
notice_secs = 3
# Look up several scanned books at once
concurrent_lookups = false
"#;

impl Config {
    /// Load configuration from a file path.
    ///
    /// With no explicit path the default location is used and a missing file
    /// yields the defaults. An explicit path must exist. A file that exists
    /// but cannot be parsed, or holds out-of-range values, is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path.is_some();
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if !path.exists() {
            if explicit {
                return Err(ConfigError::NotFound(path));
            }
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            path: path.clone(),
            source: e,
        })?;
        let config = Self::parse(&content).map_err(|e| match e {
            ConfigError::ParseError { source, .. } => ConfigError::ParseError {
                path: path.clone(),
                source,
            },
            other => other,
        })?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML content.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api.base_url must not be empty".to_string()));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "api.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.session.notice_secs == 0 {
            return Err(ConfigError::Invalid(
                "session.notice_secs must be greater than 0".to_string(),
            ));
        }
        if self.scanner.device.trim().is_empty() {
            return Err(ConfigError::Invalid("scanner.device must not be empty".to_string()));
        }
        Ok(())
    }

    /// Apply `SHELFSCAN_API_URL` and `SHELFSCAN_TOKEN` from the environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(LIBRARY_API_URL_ENV).ok(),
            std::env::var(LIBRARY_API_TOKEN_ENV).ok(),
        );
    }

    /// Override the base URL and token. Empty values are ignored.
    pub fn apply_overrides(&mut self, base_url: Option<String>, token: Option<String>) {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.api.base_url = url;
        }
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.api.token = Some(token);
        }
    }

    /// Render the effective configuration with the token masked.
    pub fn to_display_toml(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        if shown.api.token.is_some() {
            shown.api.token = Some("********".to_string());
        }
        toml::to_string_pretty(&shown).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// Write the default configuration template to `path`.
///
/// Parent directories are created. An existing file is never overwritten.
pub fn init(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    NotFound(PathBuf),
    AlreadyExists(PathBuf),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::NotFound(path) => {
                write!(f, "Config file not found: {}", path.display())
            }
            ConfigError::AlreadyExists(path) => {
                write!(f, "Config file already exists: {}", path.display())
            }
            ConfigError::Invalid(message) => write!(f, "Invalid configuration: {}", message),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("shelfscan").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/shelfscan/config.toml")
        })
}
