//! Storage location parsing.

use super::{DbError, DbResult};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

const SQLITE_SCHEME: &str = "sqlite://";
const FILE_SCHEME: &str = "file:";
const MEMORY_MARKER: &str = ":memory:";

/// Where the inventory database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    /// On-disk database file.
    File(PathBuf),
    /// Private in-process database, lost when the connection closes.
    Memory,
}

impl StorageLocation {
    /// Parses `sqlite://<path>`, `file:<path>`, a plain path, or `:memory:`.
    pub fn parse(value: &str) -> DbResult<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DbError::InvalidLocation(
                "storage url cannot be empty".to_string(),
            ));
        }

        let path = trimmed
            .strip_prefix(SQLITE_SCHEME)
            .or_else(|| trimmed.strip_prefix(FILE_SCHEME))
            .unwrap_or(trimmed);

        if path == MEMORY_MARKER {
            return Ok(Self::Memory);
        }
        if path.is_empty() {
            return Err(DbError::InvalidLocation(format!(
                "storage url `{trimmed}` has no database path"
            )));
        }
        if path.contains("://") {
            return Err(DbError::InvalidLocation(format!(
                "unsupported storage scheme in `{trimmed}`; expected sqlite://<path>"
            )));
        }

        Ok(Self::File(PathBuf::from(path)))
    }

    /// Short mode tag used in log events.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }
}

impl Display for StorageLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{SQLITE_SCHEME}{}", path.display()),
            Self::Memory => f.write_str(MEMORY_MARKER),
        }
    }
}
