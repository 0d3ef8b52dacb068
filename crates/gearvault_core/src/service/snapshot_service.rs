//! Snapshot use-case service.
//!
//! # Responsibility
//! - Pair one table store with the registry it must follow.
//! - Emit job-level `snapshot_export` / `snapshot_restore` events.
//!
//! # Invariants
//! - Service layer stays storage-agnostic; transactions belong to callers.

use super::error::{RestoreFailure, RestoreProgress, SnapshotResult};
use super::{exporter, importer};
use crate::model::snapshot::Snapshot;
use crate::registry::TableRegistry;
use crate::store::TableStore;
use log::{error, info};
use std::time::Instant;

/// Export/restore entry points over one store.
pub struct SnapshotService<'r, S: TableStore> {
    store: S,
    registry: &'r TableRegistry,
}

impl<'r, S: TableStore> SnapshotService<'r, S> {
    pub fn new(store: S, registry: &'r TableRegistry) -> Self {
        Self { store, registry }
    }

    /// Exports every registered table, one entry per table even when empty.
    pub fn export_all(&self) -> SnapshotResult<Snapshot> {
        let started_at = Instant::now();
        info!(
            "event=snapshot_export module=snapshot status=start tables={}",
            self.registry.len()
        );

        match exporter::export_all(&self.store, self.registry) {
            Ok(snapshot) => {
                info!(
                    "event=snapshot_export module=snapshot status=ok duration_ms={} tables={} rows={}",
                    started_at.elapsed().as_millis(),
                    snapshot.len(),
                    snapshot.total_rows()
                );
                Ok(snapshot)
            }
            Err(err) => {
                error!(
                    "event=snapshot_export module=snapshot status=error duration_ms={} error_code={} error={}",
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Clears then reloads every registered table from `snapshot`.
    ///
    /// Not atomic on its own: see [`RestoreFailure`] for the state a failure
    /// leaves behind.
    pub fn restore_all(&self, snapshot: &Snapshot) -> Result<RestoreProgress, RestoreFailure> {
        let started_at = Instant::now();
        info!(
            "event=snapshot_restore module=snapshot status=start tables={} rows={}",
            snapshot.len(),
            snapshot.total_rows()
        );

        match importer::restore_all(&self.store, self.registry, snapshot) {
            Ok(progress) => {
                info!(
                    "event=snapshot_restore module=snapshot status=ok duration_ms={} cleared={} loaded={} rows={}",
                    started_at.elapsed().as_millis(),
                    progress.cleared.len(),
                    progress.loaded.len(),
                    progress.rows_inserted
                );
                Ok(progress)
            }
            Err(failure) => {
                error!(
                    "event=snapshot_restore module=snapshot status=error duration_ms={} error_code={} error={}",
                    started_at.elapsed().as_millis(),
                    failure.error.code(),
                    failure.error
                );
                Err(failure)
            }
        }
    }
}
