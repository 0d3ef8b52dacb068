//! SQLite-backed table store.
//!
//! # Invariants
//! - Identifiers are always quoted; values are always bound, never inlined.
//! - Reads return rows in storage insertion order (`rowid`).
//! - Columns declared `JSON` or `BOOLEAN` read back as the JSON value written.

use super::{StoreError, StoreResult, TableStore};
use crate::model::snapshot::RowRecord;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Number, Value};
use std::collections::HashMap;

/// How a column's values map between JSON and SQLite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ColumnKind {
    #[default]
    Plain,
    /// Holds any JSON document, stored as its JSON text.
    Json,
    /// Holds a flag, stored as 0/1.
    Boolean,
}

impl ColumnKind {
    fn from_declared_type(declared: &str) -> Self {
        let declared = declared.to_ascii_uppercase();
        if declared.contains("JSON") {
            Self::Json
        } else if declared.contains("BOOL") {
            Self::Boolean
        } else {
            Self::Plain
        }
    }
}

/// Table store over a borrowed connection or transaction.
pub struct SqliteTableStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTableStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn column_kinds(&self, table: &str) -> StoreResult<HashMap<String, ColumnKind>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT name, type FROM pragma_table_info(?1);")?;
        let kinds = stmt
            .query_map([table], |row| {
                let name = row.get::<_, String>(0)?;
                let declared = row.get::<_, String>(1)?;
                Ok((name, ColumnKind::from_declared_type(&declared)))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(kinds)
    }
}

impl TableStore for SqliteTableStore<'_> {
    fn read_rows(&self, table: &str) -> StoreResult<Vec<RowRecord>> {
        let kinds = self.column_kinds(table)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT * FROM {} ORDER BY rowid;",
            quote_identifier(table)
        ))?;
        let columns = stmt
            .column_names()
            .into_iter()
            .map(|column| {
                let kind = kinds.get(column).copied().unwrap_or_default();
                (column.to_string(), kind)
            })
            .collect::<Vec<(String, ColumnKind)>>();

        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = RowRecord::new();
            for (position, (column, kind)) in columns.iter().enumerate() {
                record.insert(column.clone(), sql_to_json(row.get_ref(position)?, *kind));
            }
            records.push(record);
        }

        Ok(records)
    }

    fn clear_table(&self, table: &str) -> StoreResult<usize> {
        let removed = self
            .conn
            .execute(&format!("DELETE FROM {};", quote_identifier(table)), [])?;
        Ok(removed)
    }

    fn insert_rows(&self, table: &str, rows: &[RowRecord]) -> StoreResult<usize> {
        let quoted_table = quote_identifier(table);
        let kinds = self.column_kinds(table)?;
        for (position, row) in rows.iter().enumerate() {
            if row.is_empty() {
                self.conn
                    .execute(&format!("INSERT INTO {quoted_table} DEFAULT VALUES;"), [])?;
                continue;
            }
            if row.keys().any(|column| column.is_empty()) {
                return Err(StoreError::InvalidRow(format!(
                    "row {position} of `{table}` has an empty column name"
                )));
            }

            let values = row
                .iter()
                .map(|(column, value)| {
                    let kind = kinds.get(column).copied().unwrap_or_default();
                    json_to_sql(value, kind).map_err(|reason| {
                        StoreError::InvalidRow(format!(
                            "row {position} of `{table}`, column `{column}`: {reason}"
                        ))
                    })
                })
                .collect::<StoreResult<Vec<SqlValue>>>()?;
            let columns = row
                .keys()
                .map(|column| quote_identifier(column))
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = (1..=row.len())
                .map(|slot| format!("?{slot}"))
                .collect::<Vec<_>>()
                .join(", ");

            // Rows of one table usually share a column set, so the cache hits.
            let mut stmt = self.conn.prepare_cached(&format!(
                "INSERT INTO {quoted_table} ({columns}) VALUES ({placeholders});"
            ))?;
            stmt.execute(params_from_iter(values))?;
        }

        Ok(rows.len())
    }
}

pub(crate) fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn json_to_sql(value: &Value, kind: ColumnKind) -> Result<SqlValue, String> {
    match (value, kind) {
        (Value::Null, _) => Ok(SqlValue::Null),
        (_, ColumnKind::Json) => Ok(SqlValue::Text(value.to_string())),
        (Value::Bool(flag), _) => Ok(SqlValue::Integer(i64::from(*flag))),
        (Value::Number(number), _) => number_to_sql(number),
        (Value::String(text), _) => Ok(SqlValue::Text(text.clone())),
        (Value::Array(_) | Value::Object(_), _) => Ok(SqlValue::Text(value.to_string())),
    }
}

fn number_to_sql(number: &Number) -> Result<SqlValue, String> {
    if let Some(integer) = number.as_i64() {
        return Ok(SqlValue::Integer(integer));
    }
    if number.is_u64() {
        return Err(format!(
            "integer {number} does not fit a 64-bit signed SQLite integer"
        ));
    }
    number
        .as_f64()
        .map(SqlValue::Real)
        .ok_or_else(|| format!("number {number} has no SQLite representation"))
}

fn sql_to_json(value: ValueRef<'_>, kind: ColumnKind) -> Value {
    match (value, kind) {
        (ValueRef::Null, _) => Value::Null,
        (ValueRef::Integer(flag @ (0 | 1)), ColumnKind::Boolean) => Value::Bool(flag == 1),
        (ValueRef::Integer(integer), _) => Value::from(integer),
        (ValueRef::Real(real), _) => Number::from_f64(real).map_or(Value::Null, Value::Number),
        (ValueRef::Text(bytes), ColumnKind::Json) => serde_json::from_slice(bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned())),
        (ValueRef::Text(bytes), _) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        (ValueRef::Blob(bytes), _) => {
            Value::Array(bytes.iter().map(|byte| Value::from(*byte)).collect())
        }
    }
}
