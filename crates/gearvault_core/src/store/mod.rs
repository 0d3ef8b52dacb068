//! Storage driver contracts and the SQLite implementation.
//!
//! # Responsibility
//! - Define the three table-level primitives snapshot jobs need.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Drivers never interpret row contents; they only copy them.
//! - Table identifiers reaching a driver come from a validated registry.

mod schema;
mod sqlite_store;

pub use schema::{derive_registry_from_schema, foreign_key_edges, verify_against_schema};
pub use sqlite_store::SqliteTableStore;

use crate::db::DbError;
use crate::model::snapshot::RowRecord;
use crate::registry::RegistryError;
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage driver error.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Registry(RegistryError),
    InvalidRow(String),
    Unavailable(String),
}

impl StoreError {
    /// Whether the failure means storage itself is unreachable, as opposed to
    /// one statement being rejected.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Db(DbError::Sqlite(err)) => matches!(
                err.sqlite_error_code(),
                Some(
                    ErrorCode::CannotOpen
                        | ErrorCode::DatabaseBusy
                        | ErrorCode::DatabaseLocked
                        | ErrorCode::NotADatabase
                        | ErrorCode::SystemIoFailure
                )
            ),
            _ => false,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Registry(err) => write!(f, "{err}"),
            Self::InvalidRow(message) => write!(f, "invalid row: {message}"),
            Self::Unavailable(message) => write!(f, "storage unavailable: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Registry(err) => Some(err),
            Self::InvalidRow(_) | Self::Unavailable(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<RegistryError> for StoreError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

/// Table-level primitives used by export and restore.
pub trait TableStore {
    /// Reads every row of `table`, unfiltered and unpaginated.
    fn read_rows(&self, table: &str) -> StoreResult<Vec<RowRecord>>;
    /// Removes every row of `table`; returns how many were removed.
    fn clear_table(&self, table: &str) -> StoreResult<usize>;
    /// Inserts `rows` into `table` in order; returns how many were inserted.
    fn insert_rows(&self, table: &str, rows: &[RowRecord]) -> StoreResult<usize>;
}

impl<T: TableStore + ?Sized> TableStore for &T {
    fn read_rows(&self, table: &str) -> StoreResult<Vec<RowRecord>> {
        (**self).read_rows(table)
    }

    fn clear_table(&self, table: &str) -> StoreResult<usize> {
        (**self).clear_table(table)
    }

    fn insert_rows(&self, table: &str, rows: &[RowRecord]) -> StoreResult<usize> {
        (**self).insert_rows(table, rows)
    }
}
