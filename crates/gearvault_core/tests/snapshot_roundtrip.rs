use gearvault_core::db::open_db_in_memory;
use gearvault_core::registry::INVENTORY_TABLES;
use gearvault_core::{
    RestoreMode, RowRecord, Snapshot, SnapshotBackend, SnapshotService, SqliteSnapshotBackend,
    SqliteTableStore, TablePhase, TableRegistry,
};
use rusqlite::Connection;
use serde_json::{json, Value};

const DEPOT_SCHEMA: &str = "
    PRAGMA foreign_keys = ON;
    CREATE TABLE locations (
        id   TEXT PRIMARY KEY NOT NULL,
        name TEXT
    );
    CREATE TABLE equipment (
        id          TEXT PRIMARY KEY NOT NULL,
        location_id TEXT REFERENCES locations (id)
    );
    CREATE TABLE equipment_comments (
        id           TEXT PRIMARY KEY NOT NULL,
        equipment_id TEXT NOT NULL REFERENCES equipment (id),
        body         TEXT NOT NULL
    );
";

fn depot_conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(DEPOT_SCHEMA).unwrap();
    conn
}

fn seed_depot(conn: &Connection) {
    conn.execute_batch(
        "INSERT INTO locations (id, name) VALUES ('L0', 'Old depot');
         INSERT INTO equipment (id, location_id) VALUES ('E0', 'L0');
         INSERT INTO equipment_comments (id, equipment_id, body) VALUES ('K0', 'E0', 'dented');",
    )
    .unwrap();
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

fn snapshot_from(value: Value) -> Snapshot {
    Snapshot::from_json(value.to_string().as_bytes()).unwrap()
}

fn rows(value: Value) -> Vec<RowRecord> {
    snapshot_from(json!({ "t": value }))
        .rows("t")
        .unwrap()
        .to_vec()
}

#[test]
fn locations_and_equipment_round_trip_in_dependency_order() {
    let conn = depot_conn();
    let registry = TableRegistry::new(["locations", "equipment"]).unwrap();
    let service = SnapshotService::new(SqliteTableStore::new(&conn), &registry);

    let snapshot = snapshot_from(json!({
        "locations": [{"id": "L1", "name": "Depot"}],
        "equipment": [{"id": "E1", "location_id": "L1"}]
    }));

    let progress = service.restore_all(&snapshot).unwrap();
    assert_eq!(progress.cleared, vec!["equipment", "locations"]);
    assert_eq!(progress.loaded, vec!["locations", "equipment"]);

    let exported = service.export_all().unwrap();
    assert_eq!(
        exported.table_names().collect::<Vec<_>>(),
        vec!["locations", "equipment"]
    );
    assert_eq!(exported.rows("locations"), snapshot.rows("locations"));
    assert_eq!(exported.rows("equipment"), snapshot.rows("equipment"));
}

#[test]
fn empty_locations_snapshot_clears_referencing_equipment_first() {
    let conn = depot_conn();
    seed_depot(&conn);
    conn.execute("DELETE FROM equipment_comments;", []).unwrap();
    let registry = TableRegistry::new(["locations", "equipment"]).unwrap();
    let service = SnapshotService::new(SqliteTableStore::new(&conn), &registry);

    let progress = service
        .restore_all(&snapshot_from(json!({"locations": []})))
        .unwrap();

    assert_eq!(progress.cleared, vec!["equipment", "locations"]);
    assert!(progress.loaded.is_empty());

    let exported = service.export_all().unwrap();
    assert_eq!(exported.len(), 2);
    assert!(exported.rows("locations").unwrap().is_empty());
    assert!(exported.rows("equipment").unwrap().is_empty());
}

#[test]
fn misordered_registry_surfaces_foreign_key_failure_on_clear() {
    let conn = depot_conn();
    seed_depot(&conn);
    conn.execute("DELETE FROM equipment_comments;", []).unwrap();
    // Parent listed after child: the clear pass reaches `locations` first.
    let registry = TableRegistry::new(["equipment", "locations"]).unwrap();
    let service = SnapshotService::new(SqliteTableStore::new(&conn), &registry);

    let failure = service
        .restore_all(&snapshot_from(json!({})))
        .unwrap_err();

    assert_eq!(
        failure.error.table_context(),
        Some(("locations", TablePhase::Clear))
    );
    assert!(failure.to_string().contains("FOREIGN KEY"));
    assert_eq!(count(&conn, "locations"), 1);
    assert_eq!(count(&conn, "equipment"), 1);
}

#[test]
fn sequential_restore_keeps_partial_state_after_load_failure() {
    let conn = depot_conn();
    seed_depot(&conn);
    let registry =
        TableRegistry::new(["locations", "equipment", "equipment_comments"]).unwrap();
    let backend = SqliteSnapshotBackend::new(conn, registry, RestoreMode::Sequential).unwrap();

    let snapshot = snapshot_from(json!({
        "locations": [{"id": "L1", "name": "Depot"}],
        "equipment": [{"id": "E1", "location_id": "L9"}],
        "equipment_comments": [{"id": "K1", "equipment_id": "E1", "body": "ok"}]
    }));

    let failure = backend.restore_all(&snapshot).unwrap_err();

    assert_eq!(
        failure.error.table_context(),
        Some(("equipment", TablePhase::Load))
    );
    assert!(!failure.rolled_back);
    assert!(!failure.progress.atomic);
    assert_eq!(
        failure.progress.cleared,
        vec!["equipment_comments", "equipment", "locations"]
    );
    assert_eq!(failure.progress.loaded, vec!["locations"]);

    let after = backend.export_all().unwrap();
    assert_eq!(after.rows("locations"), snapshot.rows("locations"));
    assert!(after.rows("equipment").unwrap().is_empty());
    assert!(after.rows("equipment_comments").unwrap().is_empty());
}

#[test]
fn atomic_restore_rolls_back_everything_after_load_failure() {
    let conn = depot_conn();
    seed_depot(&conn);
    let registry =
        TableRegistry::new(["locations", "equipment", "equipment_comments"]).unwrap();
    let backend = SqliteSnapshotBackend::new(conn, registry, RestoreMode::Atomic).unwrap();
    let before = backend.export_all().unwrap();

    let snapshot = snapshot_from(json!({
        "locations": [{"id": "L1", "name": "Depot"}],
        "equipment": [{"id": "E1", "location_id": "L9"}]
    }));

    let failure = backend.restore_all(&snapshot).unwrap_err();

    assert!(failure.rolled_back);
    assert!(failure.progress.atomic);
    assert_eq!(failure.progress.loaded, vec!["locations"]);
    assert!(failure.to_string().ends_with("(rolled back)"));
    assert_eq!(backend.export_all().unwrap(), before);
}

#[test]
fn atomic_restore_commits_on_success() {
    let conn = depot_conn();
    seed_depot(&conn);
    let registry =
        TableRegistry::new(["locations", "equipment", "equipment_comments"]).unwrap();
    let backend = SqliteSnapshotBackend::new(conn, registry, RestoreMode::Atomic).unwrap();

    let snapshot = snapshot_from(json!({
        "locations": [{"id": "L1", "name": "Depot"}],
        "equipment": [{"id": "E1", "location_id": "L1"}],
        "equipment_comments": [{"id": "K1", "equipment_id": "E1", "body": "fine"}]
    }));

    let progress = backend.restore_all(&snapshot).unwrap();
    assert!(progress.atomic);
    assert_eq!(progress.rows_inserted, 3);
    assert_eq!(backend.export_all().unwrap(), snapshot_in_registry_order(&snapshot, &backend));
}

#[test]
fn backend_rejects_registry_that_contradicts_schema() {
    let conn = depot_conn();
    let registry = TableRegistry::new(["equipment", "locations"]).unwrap();

    assert!(SqliteSnapshotBackend::new(conn, registry, RestoreMode::Atomic).is_err());
}

#[test]
fn fresh_inventory_export_has_one_empty_entry_per_table() {
    let backend = SqliteSnapshotBackend::new(
        open_db_in_memory().unwrap(),
        TableRegistry::inventory(),
        RestoreMode::Atomic,
    )
    .unwrap();

    let snapshot = backend.export_all().unwrap();

    assert_eq!(
        snapshot.table_names().collect::<Vec<_>>(),
        INVENTORY_TABLES.to_vec()
    );
    assert_eq!(snapshot.total_rows(), 0);
}

#[test]
fn inventory_restore_then_export_reproduces_snapshot() {
    let backend = SqliteSnapshotBackend::new(
        open_db_in_memory().unwrap(),
        TableRegistry::inventory(),
        RestoreMode::Atomic,
    )
    .unwrap();
    let input = inventory_fixture();

    backend.restore_all(&input).unwrap();
    let exported = backend.export_all().unwrap();

    for table in INVENTORY_TABLES {
        let expected = input.rows(table).unwrap();
        let actual = exported.rows(table).unwrap();
        assert_eq!(expected.len(), actual.len(), "row count of {table}");
        for (want, got) in expected.iter().zip(actual) {
            for (column, value) in want {
                assert_eq!(got.get(column), Some(value), "{table}.{column}");
            }
        }
    }

    // A full export carries every column, so it round-trips exactly.
    backend.restore_all(&exported).unwrap();
    assert_eq!(backend.export_all().unwrap(), exported);
}

#[test]
fn json_and_boolean_columns_round_trip_exactly() {
    let backend = SqliteSnapshotBackend::new(
        open_db_in_memory().unwrap(),
        TableRegistry::inventory(),
        RestoreMode::Atomic,
    )
    .unwrap();

    let mut snapshot = Snapshot::new();
    snapshot.insert_table(
        "settings",
        rows(json!([
            {"id": "S1", "key": "theme", "value": {"dark": true, "accent": [3, 4]}},
            {"id": "S2", "key": "reminders", "value": true},
            {"id": "S3", "key": "retention_days", "value": 30},
            {"id": "S4", "key": "org_name", "value": "Alpine Rescue"},
            {"id": "S5", "key": "unset", "value": null}
        ])),
    );
    snapshot.insert_table(
        "persons",
        rows(json!([
            {"id": "P1", "first_name": "Ada", "last_name": "Berg", "active": false},
            {"id": "P2", "first_name": "Bo", "last_name": "Lind", "active": true}
        ])),
    );

    backend.restore_all(&snapshot).unwrap();
    let exported = backend.export_all().unwrap();

    for table in ["settings", "persons"] {
        let expected = snapshot.rows(table).unwrap();
        let actual = exported.rows(table).unwrap();
        assert_eq!(expected.len(), actual.len(), "row count of {table}");
        for (want, got) in expected.iter().zip(actual) {
            for (column, value) in want {
                assert_eq!(got.get(column), Some(value), "{table}.{column}");
            }
        }
    }
}

#[test]
fn booleans_in_text_columns_keep_sqlite_text_affinity() {
    let conn = depot_conn();
    let registry = TableRegistry::new(["locations"]).unwrap();
    let service = SnapshotService::new(SqliteTableStore::new(&conn), &registry);

    let mut snapshot = Snapshot::new();
    snapshot.insert_table("locations", rows(json!([{"id": "L1", "name": false}])));

    service.restore_all(&snapshot).unwrap();
    let exported = service.export_all().unwrap();

    // Only columns declared BOOLEAN read back as JSON booleans.
    assert_eq!(exported.rows("locations").unwrap()[0]["name"], json!("0"));
}

fn snapshot_in_registry_order(snapshot: &Snapshot, backend: &SqliteSnapshotBackend) -> Snapshot {
    let mut ordered = Snapshot::new();
    for table in backend.registry().forward_order() {
        ordered.insert_table(table, snapshot.rows(table).unwrap_or_default().to_vec());
    }
    ordered
}

fn inventory_fixture() -> Snapshot {
    snapshot_from(json!({
        "categories": [
            {"id": "C1", "name": "Radios"},
            {"id": "C2", "name": "Ropes", "description": "Static and dynamic"}
        ],
        "locations": [{"id": "L1", "name": "Depot", "address": "Harbour 4"}],
        "equipment": [
            {"id": "E1", "name": "Handheld 1", "category_id": "C1", "location_id": "L1", "status": "available"},
            {"id": "E2", "name": "Rope 60m", "category_id": "C2", "location_id": "L1", "status": "in_use"}
        ],
        "persons": [{"id": "P1", "first_name": "Ada", "last_name": "Berg", "role": "lead"}],
        "maintenance_templates": [
            {"id": "T1", "name": "Battery check", "interval_days": 90, "category_id": "C1"}
        ],
        "maintenance_records": [
            {"id": "R1", "equipment_id": "E1", "template_id": "T1", "performed_by": "P1", "status": "done"}
        ],
        "missions": [{"id": "M1", "title": "Ridge search", "location_id": "L1", "leader_id": "P1"}],
        "mission_equipment": [
            {"id": "ME1", "mission_id": "M1", "equipment_id": "E1", "quantity": 2},
            {"id": "ME2", "mission_id": "M1", "equipment_id": "E2", "quantity": 1}
        ],
        "settings": [{"id": "S1", "key": "org_name", "value": "Alpine Rescue"}],
        "equipment_comments": [
            {"id": "K1", "equipment_id": "E2", "author_id": "P1", "body": "Core shot at 40m"}
        ]
    }))
}
