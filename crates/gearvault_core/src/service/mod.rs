//! Snapshot export/restore use cases.
//!
//! # Responsibility
//! - Run the exporter and importer over any [`crate::store::TableStore`].
//! - Expose a thread-safe backend for transport layers.
//!
//! # See also
//! - `crate::registry` for the order both passes follow.

mod backend;
mod error;
mod exporter;
mod importer;
mod snapshot_service;

pub use backend::{RestoreMode, SnapshotBackend, SqliteSnapshotBackend};
pub use error::{RestoreFailure, RestoreProgress, SnapshotError, SnapshotResult, TablePhase};
pub use exporter::export_all;
pub use importer::restore_all;
pub use snapshot_service::SnapshotService;
