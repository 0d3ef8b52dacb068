//! Restore: clear every registered table, then load the snapshot back.
//!
//! # Invariants
//! - The clear pass visits `reverse_order()`, children before parents.
//! - The load pass visits `forward_order()`, parents before children.
//! - The clear pass finishes before the load pass starts.
//! - The first failure stops both passes; nothing here undoes earlier work.

use super::error::{RestoreFailure, RestoreProgress, SnapshotError, TablePhase};
use crate::model::snapshot::Snapshot;
use crate::registry::TableRegistry;
use crate::store::{StoreError, TableStore};
use log::{debug, error, warn};

/// Replaces every registered table's rows with the snapshot's rows.
///
/// Tables the snapshot lacks are cleared and stay empty. Tables the
/// snapshot carries but the registry lacks are ignored.
pub fn restore_all<S>(
    store: &S,
    registry: &TableRegistry,
    snapshot: &Snapshot,
) -> Result<RestoreProgress, RestoreFailure>
where
    S: TableStore + ?Sized,
{
    for table in snapshot.unknown_tables(registry) {
        warn!("event=snapshot_restore module=snapshot status=warn reason=unregistered_table table={table}");
    }

    let mut progress = RestoreProgress::default();

    for table in registry.reverse_order() {
        match store.clear_table(table) {
            Ok(removed) => {
                debug!("event=snapshot_clear module=snapshot status=ok table={table} rows={removed}");
                progress.cleared.push(table.to_string());
            }
            Err(err) => return Err(abort(table, TablePhase::Clear, err, progress)),
        }
    }

    for table in registry.forward_order() {
        let rows = match snapshot.rows(table) {
            Some(rows) if !rows.is_empty() => rows,
            _ => continue,
        };
        match store.insert_rows(table, rows) {
            Ok(inserted) => {
                debug!("event=snapshot_load module=snapshot status=ok table={table} rows={inserted}");
                progress.loaded.push(table.to_string());
                progress.rows_inserted += inserted;
            }
            Err(err) => return Err(abort(table, TablePhase::Load, err, progress)),
        }
    }

    Ok(progress)
}

fn abort(
    table: &str,
    phase: TablePhase,
    err: StoreError,
    progress: RestoreProgress,
) -> RestoreFailure {
    error!(
        "event=snapshot_{phase} module=snapshot status=error table={table} cleared={} loaded={} error={err}",
        progress.cleared.len(),
        progress.loaded.len()
    );
    RestoreFailure {
        error: SnapshotError::table_operation(table, phase, err),
        progress,
        rolled_back: false,
    }
}
