//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Interface to bind (default 127.0.0.1)
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP port (default 7337)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origin allowed by CORS; `*` allows any origin
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7337
}

fn default_allowed_origin() -> String {
    "https://tatatext.com".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origin: default_allowed_origin(),
        }
    }
}

/// Managed binary location and first-run seeding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BinaryConfig {
    /// Directory name created under the per-user config directory
    #[serde(default = "default_dir_name")]
    pub dir_name: String,
    /// Bundled executable copied into place on first run
    #[serde(default)]
    pub seed_path: Option<PathBuf>,
    /// Release asset name override (platform default if None)
    #[serde(default)]
    pub asset_name: Option<String>,
}

fn default_dir_name() -> String {
    "tatatext-helper".to_string()
}

impl Default for BinaryConfig {
    fn default() -> Self {
        Self {
            dir_name: default_dir_name(),
            seed_path: None,
            asset_name: None,
        }
    }
}

/// Background updater configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdaterConfig {
    /// Run the periodic update check (default true)
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between update checks (default 6 hours)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Release metadata endpoint
    #[serde(default = "default_release_feed_url")]
    pub release_feed_url: String,
}

fn default_true() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    6 * 60 * 60
}

fn default_release_feed_url() -> String {
    "https://api.github.com/repos/yt-dlp/yt-dlp/releases/latest".to_string()
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_interval_secs(),
            release_feed_url: default_release_feed_url(),
        }
    }
}

/// Outbound media proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProxyConfig {
    /// Total timeout for one proxied download (default 5 minutes)
    #[serde(default = "default_proxy_timeout_secs")]
    pub timeout_secs: u64,
    /// User-Agent sent upstream
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_proxy_timeout_secs() -> u64 {
    300
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_proxy_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Desktop notification configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub binary: BinaryConfig,
    #[serde(default)]
    pub updater: UpdaterConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

fn parse_bool(val: &str) -> Option<bool> {
    // Accept "true", "1", "yes" as true; "false", "0", "no" as false
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the config file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - HELPER_HOST -> server.host
    /// - HELPER_PORT -> server.port
    /// - HELPER_ALLOWED_ORIGIN -> server.allowed_origin
    /// - HELPER_SEED_PATH -> binary.seed_path
    /// - HELPER_UPDATE_ENABLED -> updater.enabled
    /// - HELPER_UPDATE_INTERVAL_SECS -> updater.interval_secs
    /// - HELPER_RELEASE_FEED_URL -> updater.release_feed_url
    /// - HELPER_PROXY_TIMEOUT_SECS -> proxy.timeout_secs
    /// - HELPER_NOTIFICATIONS -> notifications.enabled
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("HELPER_HOST") {
            if !val.is_empty() {
                self.server.host = val;
            }
        }

        if let Ok(val) = env::var("HELPER_PORT") {
            if let Ok(port) = val.parse::<u16>() {
                self.server.port = port;
            }
        }

        if let Ok(val) = env::var("HELPER_ALLOWED_ORIGIN") {
            if !val.is_empty() {
                self.server.allowed_origin = val;
            }
        }

        if let Ok(val) = env::var("HELPER_SEED_PATH") {
            if !val.is_empty() {
                self.binary.seed_path = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = env::var("HELPER_UPDATE_ENABLED") {
            if let Some(enabled) = parse_bool(&val) {
                self.updater.enabled = enabled;
            }
        }

        if let Ok(val) = env::var("HELPER_UPDATE_INTERVAL_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                if secs > 0 {
                    self.updater.interval_secs = secs;
                }
            }
        }

        if let Ok(val) = env::var("HELPER_RELEASE_FEED_URL") {
            if !val.is_empty() {
                self.updater.release_feed_url = val;
            }
        }

        if let Ok(val) = env::var("HELPER_PROXY_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                self.proxy.timeout_secs = secs;
            }
        }

        if let Ok(val) = env::var("HELPER_NOTIFICATIONS") {
            if let Some(enabled) = parse_bool(&val) {
                self.notifications.enabled = enabled;
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from an optional file
    ///
    /// A missing path or a path that does not exist falls back to defaults.
    /// Environment overrides are applied in every case.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) if p.exists() => Self::load(p),
            _ => {
                let mut config = Self::default();
                config.apply_env_overrides();
                Ok(config)
            }
        }
    }

    /// Socket address string for the HTTP listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
