//! Export: one full read per registered table.

use super::error::{SnapshotError, SnapshotResult, TablePhase};
use crate::model::snapshot::Snapshot;
use crate::registry::TableRegistry;
use crate::store::TableStore;
use log::{debug, error};

/// Reads every registered table in forward order into a snapshot.
///
/// The first failing read aborts the export; no partial snapshot escapes.
pub fn export_all<S>(store: &S, registry: &TableRegistry) -> SnapshotResult<Snapshot>
where
    S: TableStore + ?Sized,
{
    let mut snapshot = Snapshot::new();
    for table in registry.forward_order() {
        let rows = store.read_rows(table).map_err(|err| {
            error!(
                "event=snapshot_read module=snapshot status=error table={table} error={err}"
            );
            SnapshotError::table_operation(table, TablePhase::Read, err)
        })?;
        debug!(
            "event=snapshot_read module=snapshot status=ok table={table} rows={}",
            rows.len()
        );
        snapshot.insert_table(table, rows);
    }
    Ok(snapshot)
}
