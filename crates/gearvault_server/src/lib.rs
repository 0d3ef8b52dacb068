//! HTTP transport for GearVault snapshots.
//!
//! # Modules
//!
//! - [`config`] - command-line and environment configuration
//! - [`handler`] - the snapshot endpoint and health check
//! - [`server`] - router assembly and the serve loop

pub mod config;
pub mod handler;
pub mod server;

pub use config::{ConfigError, ServerConfig};
pub use handler::AppState;
pub use server::{router, run};
