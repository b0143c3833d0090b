//! # configs
//!
//! Layered settings for Photogram: compiled defaults, then an optional TOML
//! file, then `PHOTOGRAM__SECTION__KEY` environment variables.

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Used when `PHOTOGRAM_CONFIG` is unset. The extension is resolved by `config`.
pub const DEFAULT_CONFIG_PATH: &str = "config/photogram";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub ids: IdSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body, in bytes
    pub max_upload_bytes: usize,
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    /// Process-local, lost on exit
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdSettings {
    pub length: usize,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub format: LogFormat,
    /// `EnvFilter` directive; `RUST_LOG` wins when set
    pub filter: String,
}

impl Settings {
    /// Loads `.env`, then the file named by `PHOTOGRAM_CONFIG` (or the default
    /// path), then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        let path =
            std::env::var("PHOTOGRAM_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
        Self::load_from(Some(&path))
    }

    /// Like `load`, with an explicit file (or none) and no `.env` handling.
    pub fn load_from(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000_i64)?
            .set_default("server.max_upload_bytes", 10_i64 * 1024 * 1024)?
            .set_default("database.backend", "sqlite")?
            .set_default("database.url", "sqlite://photogram.db")?
            .set_default("database.max_connections", 5_i64)?
            .set_default("ids.length", 10_i64)?
            .set_default("ids.max_attempts", 16_i64)?
            .set_default("logging.format", "pretty")?
            .set_default("logging.filter", "info")?;

        if let Some(path) = path {
            debug!(path, "reading config file if present");
            builder = builder.add_source(File::with_name(path).required(false));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("PHOTOGRAM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ids.length == 0 {
            return Err(ConfigError::Invalid("ids.length must be at least 1".into()));
        }
        if self.ids.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "ids.max_attempts must be at least 1".into(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".into(),
            ));
        }
        if self.database.backend == DatabaseBackend::Sqlite && self.database.url.is_empty() {
            return Err(ConfigError::Invalid(
                "database.url is required for the sqlite backend".into(),
            ));
        }
        Ok(())
    }
}
