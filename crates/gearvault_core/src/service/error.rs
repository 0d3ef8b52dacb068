//! Snapshot job errors.

use crate::store::StoreError;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Which step of a snapshot job touched the failing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TablePhase {
    Read,
    Clear,
    Load,
}

impl TablePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Clear => "clear",
            Self::Load => "load",
        }
    }
}

impl Display for TablePhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum SnapshotError {
    /// Storage could not be reached at all.
    Connectivity(String),
    /// One statement against one table failed; the job stopped there.
    TableOperation {
        table: String,
        phase: TablePhase,
        source: StoreError,
    },
    /// Storage refused to begin or commit the restore transaction.
    Transaction(StoreError),
    /// Restore input is not a snapshot.
    MalformedPayload(String),
}

impl SnapshotError {
    pub fn table_operation(table: &str, phase: TablePhase, source: StoreError) -> Self {
        Self::TableOperation {
            table: table.to_string(),
            phase,
            source,
        }
    }

    /// Failing table and phase, when the error is tied to one table.
    pub fn table_context(&self) -> Option<(&str, TablePhase)> {
        match self {
            Self::TableOperation { table, phase, .. } => Some((table.as_str(), *phase)),
            Self::Connectivity(_) | Self::Transaction(_) | Self::MalformedPayload(_) => None,
        }
    }

    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Connectivity(_) => true,
            Self::TableOperation { source, .. } | Self::Transaction(source) => {
                source.is_connectivity()
            }
            Self::MalformedPayload(_) => false,
        }
    }

    /// Stable machine-readable tag used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Connectivity(_) => "storage_unreachable",
            Self::TableOperation { .. } if self.is_connectivity() => "storage_unreachable",
            Self::TableOperation { .. } => "table_operation_failed",
            Self::Transaction(_) => "transaction_failed",
            Self::MalformedPayload(_) => "malformed_payload",
        }
    }
}

impl Display for SnapshotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connectivity(message) => write!(f, "storage unreachable: {message}"),
            Self::TableOperation {
                table,
                phase,
                source,
            } => write!(f, "{phase} of table `{table}` failed: {source}"),
            Self::Transaction(source) => write!(f, "restore transaction failed: {source}"),
            Self::MalformedPayload(message) => write!(f, "malformed snapshot payload: {message}"),
        }
    }
}

impl Error for SnapshotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::TableOperation { source, .. } | Self::Transaction(source) => Some(source),
            Self::Connectivity(_) | Self::MalformedPayload(_) => None,
        }
    }
}

/// Tables a restore got through, per pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreProgress {
    /// Tables emptied by the clear pass, in clear order.
    pub cleared: Vec<String>,
    /// Tables that received rows in the load pass, in load order.
    pub loaded: Vec<String>,
    pub rows_inserted: usize,
    /// Whether both passes ran inside one storage transaction.
    pub atomic: bool,
}

/// Restore stopped early.
///
/// `progress` records what ran before the failure. When `rolled_back` is set
/// none of it is visible in storage any more; otherwise storage is left in
/// exactly the state `progress` describes.
#[derive(Debug)]
pub struct RestoreFailure {
    pub error: SnapshotError,
    pub progress: RestoreProgress,
    pub rolled_back: bool,
}

impl RestoreFailure {
    pub fn before_start(error: SnapshotError) -> Self {
        Self {
            error,
            progress: RestoreProgress::default(),
            rolled_back: false,
        }
    }
}

impl Display for RestoreFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)?;
        if self.rolled_back {
            f.write_str(" (rolled back)")?;
        }
        Ok(())
    }
}

impl Error for RestoreFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

impl From<SnapshotError> for RestoreFailure {
    fn from(value: SnapshotError) -> Self {
        Self::before_start(value)
    }
}
