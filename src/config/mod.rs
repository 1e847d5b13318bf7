//! Configuration management
//!
//! This module handles loading and parsing configuration for Quillpost.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Template configuration
    #[serde(default)]
    pub theme: ThemeConfig,
    /// Login session configuration
    #[serde(default)]
    pub session: SessionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory served under /static
    #[serde(default = "default_static_path")]
    pub static_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_path: default_static_path(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_static_path() -> PathBuf {
    PathBuf::from("static")
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/blog.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Template configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeConfig {
    /// Optional directory whose .html files override the embedded templates
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Blog title shown in every page header
    #[serde(default = "default_site_name")]
    pub site_name: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            path: None,
            site_name: default_site_name(),
        }
    }
}

fn default_site_name() -> String {
    "Quillpost".to_string()
}

/// Login session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Days until a login session expires
    #[serde(default = "default_expiration_days")]
    pub expiration_days: i64,
    /// Add the `Secure` attribute to the session cookie
    #[serde(default)]
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiration_days: default_expiration_days(),
            secure_cookie: false,
        }
    }
}

fn default_expiration_days() -> i64 {
    7
}

/// Longest accepted session lifetime, in days
pub const MAX_EXPIRATION_DAYS: i64 = 3650;

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Read `path`, falling back to defaults when the file is missing or blank.
    ///
    /// Malformed YAML is reported with its line and column.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::FileRead {
                    path: path.display().to_string(),
                    source,
                }
                .into())
            }
        };

        let config = Self::from_yaml(&content).map_err(|message| ConfigError::ParseError {
            path: path.display().to_string(),
            message,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn from_yaml(content: &str) -> Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| match e.location() {
            Some(at) => format!("line {}, column {}: {}", at.line(), at.column(), e),
            None => e.to_string(),
        })
    }

    /// [`Config::load`], then let `QUILLPOST_*` environment variables win:
    ///
    /// | Variable | Setting |
    /// |---|---|
    /// | `QUILLPOST_SERVER_HOST` | `server.host` |
    /// | `QUILLPOST_SERVER_PORT` | `server.port` |
    /// | `QUILLPOST_DATABASE_DRIVER` | `database.driver` |
    /// | `QUILLPOST_DATABASE_URL` | `database.url` |
    /// | `QUILLPOST_THEME_PATH` | `theme.path` |
    /// | `QUILLPOST_SITE_NAME` | `theme.site_name` |
    /// | `QUILLPOST_SESSION_EXPIRATION_DAYS` | `session.expiration_days` |
    ///
    /// Values that do not parse are ignored with a warning.
    pub fn load_with_env(path: &Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;

        env_override("QUILLPOST_SERVER_HOST", &mut config.server.host);
        env_override("QUILLPOST_SERVER_PORT", &mut config.server.port);
        env_override("QUILLPOST_DATABASE_DRIVER", &mut config.database.driver);
        env_override("QUILLPOST_DATABASE_URL", &mut config.database.url);
        env_override("QUILLPOST_SITE_NAME", &mut config.theme.site_name);
        env_override("QUILLPOST_SESSION_EXPIRATION_DAYS", &mut config.session.expiration_days);
        if let Ok(path) = std::env::var("QUILLPOST_THEME_PATH") {
            config.theme.path = Some(PathBuf::from(path));
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the server unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_EXPIRATION_DAYS).contains(&self.session.expiration_days) {
            return Err(ConfigError::ValidationError(format!(
                "session.expiration_days must be between 1 and {}, got {}",
                MAX_EXPIRATION_DAYS, self.session.expiration_days
            )));
        }
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.url must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Replace `target` with the parsed value of the environment variable `key`
fn env_override<T: FromStr>(key: &str, target: &mut T) {
    let Ok(raw) = std::env::var(key) else {
        return;
    };
    match raw.parse() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!("Ignoring {}: cannot parse {:?}", key, raw),
    }
}

impl FromStr for DatabaseDriver {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(DatabaseDriver::Sqlite),
            "mysql" => Ok(DatabaseDriver::Mysql),
            other => Err(ConfigError::ValidationError(format!(
                "unknown database driver '{}'",
                other
            ))),
        }
    }
}

// Shared mutex for config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
