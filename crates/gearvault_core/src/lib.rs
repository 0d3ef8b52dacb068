//! Full-database snapshot and restore for the GearVault inventory.
//! This crate owns table ordering and the destructive restore path.

pub mod db;
pub mod logging;
pub mod model;
pub mod registry;
pub mod service;
pub mod store;

pub use logging::{default_log_level, init_logging, logging_status, LogSink};
pub use model::snapshot::{PayloadError, RowRecord, Snapshot};
pub use registry::{ForeignKeyEdge, RegistryError, TableRegistry};
pub use service::{
    RestoreFailure, RestoreMode, RestoreProgress, SnapshotBackend, SnapshotError,
    SnapshotResult, SnapshotService, SqliteSnapshotBackend, TablePhase,
};
pub use store::{SqliteTableStore, StoreError, StoreResult, TableStore};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
