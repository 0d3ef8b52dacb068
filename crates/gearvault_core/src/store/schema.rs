//! Foreign-key introspection for start-up registry checks.

use super::StoreResult;
use crate::registry::{ForeignKeyEdge, RegistryError, TableRegistry};
use log::{info, warn};
use rusqlite::Connection;
use std::collections::BTreeSet;

/// Reads every foreign-key edge whose child is one of `tables`.
///
/// Edges are deduplicated and sorted; composite keys appear once.
pub fn foreign_key_edges(conn: &Connection, tables: &[String]) -> StoreResult<Vec<ForeignKeyEdge>> {
    let mut stmt = conn.prepare("SELECT DISTINCT \"table\" FROM pragma_foreign_key_list(?1);")?;
    let mut edges = BTreeSet::new();

    for table in tables {
        let parents = stmt
            .query_map([table.as_str()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        for parent in parents {
            edges.insert(ForeignKeyEdge::new(table.as_str(), parent));
        }
    }

    Ok(edges.into_iter().collect())
}

/// Fails fast when the live schema disagrees with `registry`.
///
/// # Errors
/// - `MissingTable` when a registered table does not exist.
/// - `OrderViolation` when a live foreign key points forward in the order.
pub fn verify_against_schema(conn: &Connection, registry: &TableRegistry) -> StoreResult<()> {
    ensure_tables_exist(conn, registry.tables())?;
    let edges = registered_edges(conn, registry.tables())?;
    registry.check_edges(&edges)?;

    info!(
        "event=registry_verify module=store status=ok tables={} edges={}",
        registry.len(),
        edges.len()
    );
    Ok(())
}

/// Builds a registry for `tables` ordered by the live foreign keys.
pub fn derive_registry_from_schema(
    conn: &Connection,
    tables: &[String],
) -> StoreResult<TableRegistry> {
    ensure_tables_exist(conn, tables)?;
    let edges = registered_edges(conn, tables)?;
    let registry = TableRegistry::derive(tables.iter().cloned(), &edges)?;

    info!(
        "event=registry_derive module=store status=ok tables={} edges={}",
        registry.len(),
        edges.len()
    );
    Ok(registry)
}

fn ensure_tables_exist(conn: &Connection, tables: &[String]) -> StoreResult<()> {
    let mut stmt = conn.prepare(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
    )?;
    for table in tables {
        let exists: bool = stmt.query_row([table.as_str()], |row| row.get(0))?;
        if !exists {
            return Err(RegistryError::MissingTable(table.clone()).into());
        }
    }
    Ok(())
}

fn registered_edges(conn: &Connection, tables: &[String]) -> StoreResult<Vec<ForeignKeyEdge>> {
    let (inside, outside): (Vec<_>, Vec<_>) = foreign_key_edges(conn, tables)?
        .into_iter()
        .partition(|edge| tables.contains(&edge.parent));

    for edge in outside {
        warn!(
            "event=registry_verify module=store status=warn reason=unregistered_parent child={} parent={}",
            edge.child, edge.parent
        );
    }
    Ok(inside)
}
