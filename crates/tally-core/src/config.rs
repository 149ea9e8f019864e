//! Configuration loading and typed config structures.
//!
//! Configuration is a small YAML document. Every field has a default, so an
//! empty file (or no file at all) yields a usable store writing to
//! `tally.db` in the working directory.
//!
//! ```yaml
//! database:
//!   path: "/var/lib/tally/analytics.db"
//!   max_connections: 5
//!   busy_timeout_ms: 5000
//! site:
//!   domain: "mysite.com"
//! logging:
//!   level: "info"
//!   json: false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tally_db::SqliteConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TallyConfig {
    /// Database location and pool settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Site-wide defaults applied to logged events.
    #[serde(default)]
    pub site: SiteConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TallyConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `TALLY_DATABASE_PATH` overrides `database.path`
    /// - `TALLY_DOMAIN` overrides `site.domain`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override settings with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TALLY_DATABASE_PATH") {
            self.database.path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("TALLY_DOMAIN") {
            self.site.domain = Some(val);
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the `SQLite` file; created if missing.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Use a private in-memory database instead of `path`.
    #[serde(default)]
    pub in_memory: bool,

    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Milliseconds a statement waits on a locked database.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Milliseconds to wait for a free pooled connection.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

impl DatabaseConfig {
    /// Translate into connection-level settings.
    pub fn to_sqlite_config(&self) -> SqliteConfig {
        let base = if self.in_memory {
            SqliteConfig::in_memory()
        } else {
            SqliteConfig::new(&self.path).with_max_connections(self.max_connections)
        };
        base.with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .with_acquire_timeout(Duration::from_millis(self.acquire_timeout_ms))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            in_memory: false,
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

/// Site-wide defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SiteConfig {
    /// Domain recorded on events that do not name one.
    #[serde(default)]
    pub domain: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("tally.db")
}

const fn default_max_connections() -> u32 {
    5
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

const fn default_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_owned()
}
