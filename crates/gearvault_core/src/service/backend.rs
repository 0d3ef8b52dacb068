//! Shared snapshot backend for request handlers and tools.
//!
//! # Invariants
//! - One connection serves every job; jobs run one at a time.
//! - In atomic mode a failed restore leaves storage untouched.

use super::error::{RestoreFailure, RestoreProgress, SnapshotError, SnapshotResult};
use super::snapshot_service::SnapshotService;
use crate::db::{open_location, StorageLocation};
use crate::model::snapshot::Snapshot;
use crate::registry::TableRegistry;
use crate::store::{
    derive_registry_from_schema, verify_against_schema, SqliteTableStore, StoreError, StoreResult,
};
use log::{error, info, warn};
use rusqlite::{Connection, TransactionBehavior};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

/// How a restore treats the two passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestoreMode {
    /// Both passes in one transaction; any failure rolls everything back.
    #[default]
    Atomic,
    /// Each statement commits on its own; a failure leaves partial state.
    Sequential,
}

impl RestoreMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Atomic => "atomic",
            Self::Sequential => "sequential",
        }
    }
}

impl Display for RestoreMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RestoreMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "atomic" => Ok(Self::Atomic),
            "sequential" => Ok(Self::Sequential),
            other => Err(format!(
                "unsupported restore mode `{other}`; expected atomic|sequential"
            )),
        }
    }
}

/// Full-database export and restore, callable from any thread.
pub trait SnapshotBackend: Send + Sync {
    fn registry(&self) -> &TableRegistry;
    fn export_all(&self) -> SnapshotResult<Snapshot>;
    fn restore_all(&self, snapshot: &Snapshot) -> Result<RestoreProgress, RestoreFailure>;
}

/// SQLite snapshot backend holding one bootstrapped connection.
pub struct SqliteSnapshotBackend {
    conn: Mutex<Connection>,
    registry: TableRegistry,
    mode: RestoreMode,
}

impl SqliteSnapshotBackend {
    /// Wraps a bootstrapped connection after checking `registry` against it.
    ///
    /// # Errors
    /// - Registry tables missing from storage.
    /// - Live foreign keys that contradict the registry order.
    pub fn new(conn: Connection, registry: TableRegistry, mode: RestoreMode) -> StoreResult<Self> {
        verify_against_schema(&conn, &registry)?;
        info!(
            "event=backend_ready module=snapshot status=ok tables={} mode={mode}",
            registry.len()
        );
        Ok(Self {
            conn: Mutex::new(conn),
            registry,
            mode,
        })
    }

    /// Opens `location` with the inventory registry.
    ///
    /// With `derive_order` the inventory tables are re-ordered from the live
    /// foreign keys instead of trusting the built-in list.
    pub fn open_inventory(
        location: &StorageLocation,
        derive_order: bool,
        mode: RestoreMode,
    ) -> StoreResult<Self> {
        let conn = open_location(location)?;
        let inventory = TableRegistry::inventory();
        let registry = if derive_order {
            derive_registry_from_schema(&conn, inventory.tables())?
        } else {
            inventory
        };
        Self::new(conn, registry, mode)
    }

    pub fn mode(&self) -> RestoreMode {
        self.mode
    }

    fn lock(&self) -> SnapshotResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| {
            SnapshotError::Connectivity("storage connection lock poisoned".to_string())
        })
    }

    fn restore_in_transaction(
        &self,
        conn: &mut Connection,
        snapshot: &Snapshot,
    ) -> Result<RestoreProgress, RestoreFailure> {
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| SnapshotError::Transaction(StoreError::from(err)))?;

        let outcome =
            SnapshotService::new(SqliteTableStore::new(&tx), &self.registry).restore_all(snapshot);

        match outcome {
            Ok(mut progress) => {
                progress.atomic = true;
                match tx.commit() {
                    Ok(()) => Ok(progress),
                    Err(err) => {
                        error!(
                            "event=snapshot_restore module=snapshot status=error error_code=commit_failed error={err}"
                        );
                        Err(RestoreFailure {
                            error: SnapshotError::Transaction(StoreError::from(err)),
                            progress,
                            rolled_back: false,
                        })
                    }
                }
            }
            Err(mut failure) => {
                failure.progress.atomic = true;
                match tx.rollback() {
                    Ok(()) => {
                        warn!(
                            "event=snapshot_restore module=snapshot status=rolled_back cleared={} loaded={}",
                            failure.progress.cleared.len(),
                            failure.progress.loaded.len()
                        );
                        failure.rolled_back = true;
                    }
                    Err(err) => error!(
                        "event=snapshot_restore module=snapshot status=error error_code=rollback_failed error={err}"
                    ),
                }
                Err(failure)
            }
        }
    }
}

impl SnapshotBackend for SqliteSnapshotBackend {
    fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    fn export_all(&self) -> SnapshotResult<Snapshot> {
        let conn = self.lock()?;
        let service = SnapshotService::new(SqliteTableStore::new(&conn), &self.registry);
        service.export_all()
    }

    fn restore_all(&self, snapshot: &Snapshot) -> Result<RestoreProgress, RestoreFailure> {
        let mut conn = self.lock()?;
        match self.mode {
            RestoreMode::Atomic => self.restore_in_transaction(&mut conn, snapshot),
            RestoreMode::Sequential => {
                let service = SnapshotService::new(SqliteTableStore::new(&conn), &self.registry);
                service.restore_all(snapshot)
            }
        }
    }
}
