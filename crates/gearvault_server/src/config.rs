//! Runtime configuration, read once at start-up.
//!
//! Every flag falls back to a `GEARVAULT_*` environment variable.

use clap::Parser;
use gearvault_core::db::{DbError, StorageLocation};
use gearvault_core::{default_log_level, LogSink, RestoreMode};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;
pub const HEALTH_ROUTE: &str = "/health";

#[derive(Debug)]
pub enum ConfigError {
    StorageUrl(DbError),
    Route(String),
    BodyLimit,
    LogDir(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StorageUrl(err) => write!(f, "{err}"),
            Self::Route(message) => write!(f, "invalid route: {message}"),
            Self::BodyLimit => write!(f, "max body size must be greater than zero"),
            Self::LogDir(message) => write!(f, "invalid log directory: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StorageUrl(err) => Some(err),
            Self::Route(_) | Self::BodyLimit | Self::LogDir(_) => None,
        }
    }
}

/// Snapshot/restore HTTP service for the GearVault inventory.
#[derive(Debug, Clone, Parser)]
#[command(name = "gearvault-server", version)]
pub struct ServerConfig {
    /// Inventory database: `sqlite://<path>`, a plain path, or `:memory:`
    #[arg(long, env = "GEARVAULT_STORAGE_URL")]
    pub storage_url: String,

    /// Host to bind to
    #[arg(long, env = "GEARVAULT_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "GEARVAULT_PORT", default_value_t = 8787)]
    pub port: u16,

    /// Path of the snapshot endpoint
    #[arg(long, env = "GEARVAULT_ROUTE", default_value = "/backup")]
    pub route: String,

    /// `atomic` or `sequential`
    #[arg(long, env = "GEARVAULT_RESTORE_MODE", default_value = "atomic")]
    pub restore_mode: RestoreMode,

    /// Order tables by the live foreign keys instead of the built-in list
    #[arg(long)]
    pub derive_order: bool,

    /// Largest accepted restore payload, in bytes
    #[arg(long, env = "GEARVAULT_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// trace|debug|info|warn|error
    #[arg(long, env = "GEARVAULT_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Absolute directory for rolling log files; stderr when unset
    #[arg(long, env = "GEARVAULT_LOG_DIR")]
    pub log_dir: Option<String>,
}

impl ServerConfig {
    /// Checks everything that does not need storage access.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage_location()?;
        self.log_sink()?;

        if !self.route.starts_with('/') {
            return Err(ConfigError::Route(format!(
                "`{}` must start with `/`",
                self.route
            )));
        }
        if self.route == HEALTH_ROUTE {
            return Err(ConfigError::Route(format!(
                "`{HEALTH_ROUTE}` is reserved"
            )));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::BodyLimit);
        }
        Ok(())
    }

    pub fn storage_location(&self) -> Result<StorageLocation, ConfigError> {
        StorageLocation::parse(&self.storage_url).map_err(ConfigError::StorageUrl)
    }

    pub fn log_sink(&self) -> Result<LogSink, ConfigError> {
        LogSink::from_option(self.log_dir.as_deref()).map_err(ConfigError::LogDir)
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(default_log_level())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
