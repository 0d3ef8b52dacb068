//! Built-in registry for the equipment inventory schema.

use super::table_registry::{ForeignKeyEdge, TableRegistry};

/// Inventory tables in parent-before-child order.
pub const INVENTORY_TABLES: &[&str] = &[
    "categories",
    "locations",
    "equipment",
    "persons",
    "maintenance_templates",
    "maintenance_records",
    "missions",
    "mission_equipment",
    "settings",
    "equipment_comments",
];

// (child, parent)
const INVENTORY_EDGES: &[(&str, &str)] = &[
    ("equipment", "categories"),
    ("equipment", "locations"),
    ("maintenance_templates", "categories"),
    ("maintenance_records", "equipment"),
    ("maintenance_records", "maintenance_templates"),
    ("maintenance_records", "persons"),
    ("missions", "locations"),
    ("missions", "persons"),
    ("mission_equipment", "missions"),
    ("mission_equipment", "equipment"),
    ("equipment_comments", "equipment"),
    ("equipment_comments", "persons"),
];

/// Declared foreign-key edges of the inventory schema.
pub fn inventory_dependencies() -> Vec<ForeignKeyEdge> {
    INVENTORY_EDGES
        .iter()
        .map(|(child, parent)| ForeignKeyEdge::new(*child, *parent))
        .collect()
}

impl TableRegistry {
    /// Returns the fixed inventory registry.
    ///
    /// The list is static and covered by tests against
    /// [`inventory_dependencies`] and the bundled schema.
    pub fn inventory() -> Self {
        Self::from_trusted(INVENTORY_TABLES.iter().map(|table| table.to_string()))
    }
}
