//! Snapshot document model.
//!
//! # Invariants
//! - Row records are opaque; nothing in this crate interprets their fields.
//! - A snapshot keeps tables in the order they were inserted.

pub mod snapshot;
