//! Configuration system for tanalyzer.
//!
//! Provides layered configuration from multiple sources:
//!
//! 1. **Compiled defaults** - Sensible defaults built into the binary
//! 2. **User config file** - `~/.config/tanalyzer/config.toml`
//! 3. **Environment variables** - `TANALYZE_*` prefix
//! 4. **CLI arguments** - Highest priority, always wins
//!
//! # Example Configuration File
//!
//! ```toml
//! [paths]
//! db = "/home/me/.twitter-analyzer.db"
//!
//! [api]
//! base_url = "https://api.twitter.com/1.1"
//! page_size = 200
//! request_timeout_secs = 30
//! connect_timeout_secs = 10
//!
//! [cache]
//! user_capacity = 10000
//!
//! [trolls]
//! polarity = -0.15
//! subjectivity = 0.5
//!
//! [output]
//! format = "text"
//! colors = true
//! ```

use crate::api::DEFAULT_PAGE_SIZE;
use crate::cache::DEFAULT_USER_CACHE_CAPACITY;
use crate::client::DEFAULT_BASE_URL;
use crate::report::{DEFAULT_POLARITY_THRESHOLD, DEFAULT_SUBJECTIVITY_THRESHOLD, TrollThresholds};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Main configuration structure for tanalyzer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub trolls: TrollsConfig,
    pub output: OutputConfig,
}

/// Path configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Path to the `SQLite` database file.
    /// Environment variable: `TANALYZE_DB`
    pub db: Option<PathBuf>,
}

/// HTTP client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// REST API root. Environment variable: `TANALYZE_API_URL`
    pub base_url: String,

    /// Records requested per page. Environment variable: `TANALYZE_PAGE_SIZE`
    pub page_size: u32,

    /// Whole-request timeout.
    pub request_timeout_secs: u64,

    /// TCP/TLS connect timeout.
    pub connect_timeout_secs: u64,
}

/// Identity cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Users kept in memory during a sync run.
    pub user_capacity: usize,
}

/// Default thresholds for `find-trolls`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrollsConfig {
    pub polarity: f64,
    pub subjectivity: f64,
}

/// Output formatting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format: text, json, json-pretty.
    /// Environment variable: `TANALYZE_FORMAT`
    pub format: String,

    /// Enable colored output.
    pub colors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            user_capacity: DEFAULT_USER_CACHE_CAPACITY,
        }
    }
}

impl Default for TrollsConfig {
    fn default() -> Self {
        Self {
            polarity: DEFAULT_POLARITY_THRESHOLD,
            subjectivity: DEFAULT_SUBJECTIVITY_THRESHOLD,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
            colors: true,
        }
    }
}

impl TrollsConfig {
    #[must_use]
    pub const fn thresholds(&self) -> TrollThresholds {
        TrollThresholds {
            polarity: self.polarity,
            subjectivity: self.subjectivity,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. User config file (~/.config/tanalyzer/config.toml)
    /// 3. Compiled defaults
    pub fn load() -> Self {
        let mut config = Self::load_user_config().unwrap_or_default();
        config.apply_env_overrides();
        debug!("Configuration loaded: {:?}", config);
        config
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            debug!("Config file not found: {}", path.display());
            return None;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    info!("Loaded config from: {}", path.display());
                    Some(config)
                }
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            }
        }
    }

    fn load_user_config() -> Option<Self> {
        let config_path = Self::user_config_path()?;
        Self::load_from_file(&config_path)
    }

    /// Get the path to the user configuration file.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tanalyzer").join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `TANALYZE_*` style overrides from any variable source.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(db) = var("TANALYZE_DB") {
            self.paths.db = Some(PathBuf::from(db));
        }

        if let Some(url) = var("TANALYZE_API_URL") {
            self.api.base_url = url;
        }
        if let Some(size) = var("TANALYZE_PAGE_SIZE") {
            match size.parse() {
                Ok(n) => self.api.page_size = n,
                Err(_) => warn!("Ignoring invalid TANALYZE_PAGE_SIZE: {size}"),
            }
        }

        if let Some(format) = var("TANALYZE_FORMAT") {
            self.output.format = format;
        }
        if var("TANALYZE_NO_COLOR").is_some() || var("NO_COLOR").is_some() {
            self.output.colors = false;
        }
    }

    /// Get the database path, using the default if not configured.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.paths
            .db
            .clone()
            .unwrap_or_else(crate::default_db_path)
    }

    /// Save the current configuration to the user config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined,
    /// the parent directory cannot be created, or the file cannot be written.
    pub fn save(&self) -> std::io::Result<PathBuf> {
        let config_path = Self::user_config_path().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config directory",
            )
        })?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        std::fs::write(&config_path, content)?;
        info!("Saved config to: {}", config_path.display());
        Ok(config_path)
    }
}
