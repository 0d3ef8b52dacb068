//! Point-in-time copy of every registered table.
//!
//! # Responsibility
//! - Carry exported rows keyed by table identifier.
//! - Parse untrusted restore payloads into a well-formed shape.
//!
//! # Invariants
//! - Serialized form is a JSON object: table -> array of row objects.
//! - Parsing never accepts a table entry that is not an array of objects.

use crate::registry::TableRegistry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One table row: column name to scalar or JSON value.
pub type RowRecord = serde_json::Map<String, Value>;

/// Restore payload could not be read as a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadError(String);

impl PayloadError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl Display for PayloadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for PayloadError {}

/// Table identifier -> rows, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    tables: IndexMap<String, Vec<RowRecord>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a restore payload.
    ///
    /// A `null` table entry is read as an empty table.
    ///
    /// # Errors
    /// - Body is not JSON, or not an object keyed by table name.
    /// - A table entry is not an array, or holds a non-object row.
    pub fn from_json(bytes: &[u8]) -> Result<Self, PayloadError> {
        let document: Value = serde_json::from_slice(bytes)
            .map_err(|err| PayloadError::new(format!("snapshot is not valid JSON: {err}")))?;

        let Value::Object(entries) = document else {
            return Err(PayloadError::new(
                "snapshot must be a JSON object keyed by table name",
            ));
        };

        let mut snapshot = Self::new();
        for (table, entry) in entries {
            let rows = match entry {
                Value::Null => Vec::new(),
                Value::Array(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(position, item)| match item {
                        Value::Object(row) => Ok(row),
                        other => Err(PayloadError::new(format!(
                            "row {position} of table `{table}` must be a JSON object, got {}",
                            json_kind(&other)
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                other => {
                    return Err(PayloadError::new(format!(
                        "table `{table}` must map to an array of rows, got {}",
                        json_kind(&other)
                    )));
                }
            };
            snapshot.insert_table(table, rows);
        }

        Ok(snapshot)
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Sets the rows of one table, replacing any previous entry.
    pub fn insert_table(&mut self, table: impl Into<String>, rows: Vec<RowRecord>) {
        self.tables.insert(table.into(), rows);
    }

    /// Rows for `table`, or `None` when the snapshot has no entry for it.
    pub fn rows(&self, table: &str) -> Option<&[RowRecord]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn total_rows(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    /// Tables carried by the snapshot that `registry` does not know about.
    pub fn unknown_tables<'a>(&'a self, registry: &TableRegistry) -> Vec<&'a str> {
        self.table_names()
            .filter(|table| !registry.contains(table))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::Snapshot;
    use crate::registry::TableRegistry;
    use serde_json::json;

    #[test]
    fn from_json_keeps_rows_and_treats_null_as_empty() {
        let body = json!({
            "locations": [{"id": "L1", "name": "Depot"}],
            "equipment": null
        });
        let snapshot = Snapshot::from_json(body.to_string().as_bytes()).unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.rows("locations").unwrap().len(), 1);
        assert_eq!(snapshot.rows("equipment").unwrap().len(), 0);
        assert!(snapshot.rows("persons").is_none());
        assert_eq!(snapshot.total_rows(), 1);
    }

    #[test]
    fn from_json_rejects_wrong_shapes() {
        let cases = [
            ("not json", "not valid JSON"),
            ("[1, 2]", "JSON object keyed by table name"),
            (r#"{"locations": {"id": "L1"}}"#, "must map to an array"),
            (r#"{"locations": [1]}"#, "row 0 of table `locations`"),
        ];
        for (body, expected) in cases {
            let error = Snapshot::from_json(body.as_bytes()).expect_err(body);
            assert!(
                error.message().contains(expected),
                "`{}` should mention `{expected}`",
                error.message()
            );
        }
    }

    #[test]
    fn serialized_form_is_plain_table_map_in_insertion_order() {
        let mut snapshot = Snapshot::new();
        snapshot.insert_table("locations", Vec::new());
        snapshot.insert_table("equipment", Vec::new());

        let text = String::from_utf8(snapshot.to_json().unwrap()).unwrap();
        assert_eq!(text, r#"{"locations":[],"equipment":[]}"#);
    }

    #[test]
    fn unknown_tables_lists_entries_outside_registry() {
        let registry = TableRegistry::new(["locations"]).unwrap();
        let body = json!({"locations": [], "legacy_audit": []});
        let snapshot = Snapshot::from_json(body.to_string().as_bytes()).unwrap();

        assert_eq!(snapshot.unknown_tables(&registry), vec!["legacy_audit"]);
    }
}
