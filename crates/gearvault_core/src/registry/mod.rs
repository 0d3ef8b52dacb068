//! Table registry: the dependency-respecting order shared by export and restore.
//!
//! # Responsibility
//! - Hold the canonical parent-before-child table order.
//! - Validate that order against declared foreign-key edges.
//! - Derive an order from edges when no hand-ordered list is trusted.
//!
//! # Invariants
//! - A registry is immutable once constructed.
//! - `reverse_order()` is always the exact reverse of `forward_order()`.
//! - Any table may reference only tables earlier in forward order.

mod inventory;
mod table_registry;

pub use inventory::{inventory_dependencies, INVENTORY_TABLES};
pub use table_registry::{ForeignKeyEdge, RegistryError, RegistryResult, TableRegistry};
