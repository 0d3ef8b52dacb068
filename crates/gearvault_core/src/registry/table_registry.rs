//! Ordered table registry and its validation rules.

use once_cell::sync::Lazy;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use regex::Regex;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};

static TABLE_IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid table identifier regex")
});

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Registry construction and validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    Empty,
    InvalidIdentifier(String),
    DuplicateTable(String),
    UnknownTable(String),
    OrderViolation { child: String, parent: String },
    DependencyCycle(Vec<String>),
    MissingTable(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "table registry cannot be empty"),
            Self::InvalidIdentifier(value) => write!(f, "invalid table identifier `{value}`"),
            Self::DuplicateTable(value) => write!(f, "table registered twice: {value}"),
            Self::UnknownTable(value) => {
                write!(f, "foreign key references unregistered table: {value}")
            }
            Self::OrderViolation { child, parent } => write!(
                f,
                "table `{child}` references `{parent}` but is ordered before it"
            ),
            Self::DependencyCycle(tables) => {
                write!(f, "foreign keys form a cycle between: {}", tables.join(", "))
            }
            Self::MissingTable(value) => {
                write!(f, "registered table does not exist in storage: {value}")
            }
        }
    }
}

impl Error for RegistryError {}

/// One declared foreign-key reference: rows of `child` point at rows of `parent`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ForeignKeyEdge {
    pub child: String,
    pub parent: String,
}

impl ForeignKeyEdge {
    pub fn new(child: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            child: child.into(),
            parent: parent.into(),
        }
    }

    fn is_self_reference(&self) -> bool {
        self.child == self.parent
    }
}

/// Immutable, dependency-respecting list of table identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRegistry {
    tables: Vec<String>,
}

impl TableRegistry {
    /// Builds a registry from a hand-ordered list.
    ///
    /// Only identifiers are validated here; the order is taken as given.
    /// Use [`TableRegistry::with_dependencies`] to also check it.
    pub fn new<I, S>(tables: I) -> RegistryResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tables = tables.into_iter().map(Into::into).collect::<Vec<String>>();
        validate_tables(&tables)?;
        Ok(Self { tables })
    }

    /// Builds a registry from a hand-ordered list and checks it against edges.
    ///
    /// # Errors
    /// - `UnknownTable` when an edge names a table outside the list.
    /// - `OrderViolation` when a child is listed before its parent.
    pub fn with_dependencies<I, S>(tables: I, edges: &[ForeignKeyEdge]) -> RegistryResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registry = Self::new(tables)?;
        registry.check_edges(edges)?;
        Ok(registry)
    }

    /// Derives forward order from edges by topological sort.
    ///
    /// Tables without a constraint between them keep their relative input
    /// order, so an already valid list is returned unchanged.
    ///
    /// # Errors
    /// - `DependencyCycle` listing every table caught in a cycle.
    pub fn derive<I, S>(tables: I, edges: &[ForeignKeyEdge]) -> RegistryResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let declared = Self::new(tables)?;
        let index = declared.index_by_name();

        let mut graph = DiGraph::<usize, ()>::with_capacity(declared.len(), edges.len());
        let nodes = (0..declared.len())
            .map(|position| graph.add_node(position))
            .collect::<Vec<NodeIndex>>();

        for edge in edges.iter().filter(|edge| !edge.is_self_reference()) {
            let parent = lookup(&index, &edge.parent)?;
            let child = lookup(&index, &edge.child)?;
            graph.update_edge(nodes[parent], nodes[child], ());
        }

        let mut cyclic = tarjan_scc(&graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .flatten()
            .map(|node| graph[node])
            .collect::<Vec<usize>>();
        if !cyclic.is_empty() {
            cyclic.sort_unstable();
            return Err(RegistryError::DependencyCycle(
                cyclic
                    .into_iter()
                    .map(|position| declared.tables[position].clone())
                    .collect(),
            ));
        }

        let mut pending = nodes
            .iter()
            .map(|node| graph.neighbors_directed(*node, Direction::Incoming).count())
            .collect::<Vec<usize>>();
        let mut ready = pending
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(position, _)| Reverse(position))
            .collect::<BinaryHeap<_>>();

        let mut ordered = Vec::with_capacity(declared.len());
        while let Some(Reverse(position)) = ready.pop() {
            ordered.push(declared.tables[position].clone());
            for child in graph.neighbors_directed(nodes[position], Direction::Outgoing) {
                let child = graph[child];
                pending[child] -= 1;
                if pending[child] == 0 {
                    ready.push(Reverse(child));
                }
            }
        }

        Ok(Self { tables: ordered })
    }

    pub(crate) fn from_trusted(tables: impl IntoIterator<Item = String>) -> Self {
        Self {
            tables: tables.into_iter().collect(),
        }
    }

    /// Checks that every edge points from a later table to an earlier one.
    pub fn check_edges(&self, edges: &[ForeignKeyEdge]) -> RegistryResult<()> {
        let index = self.index_by_name();
        for edge in edges {
            let child = lookup(&index, &edge.child)?;
            let parent = lookup(&index, &edge.parent)?;
            if parent > child {
                return Err(RegistryError::OrderViolation {
                    child: edge.child.clone(),
                    parent: edge.parent.clone(),
                });
            }
        }
        Ok(())
    }

    /// Parent-before-child order, used by export and the load pass.
    pub fn forward_order(&self) -> impl DoubleEndedIterator<Item = &str> + '_ {
        self.tables.iter().map(String::as_str)
    }

    /// Child-before-parent order, used by the clear pass.
    pub fn reverse_order(&self) -> impl DoubleEndedIterator<Item = &str> + '_ {
        self.forward_order().rev()
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.iter().any(|registered| registered == table)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn index_by_name(&self) -> HashMap<&str, usize> {
        self.tables
            .iter()
            .enumerate()
            .map(|(position, table)| (table.as_str(), position))
            .collect()
    }
}

fn validate_tables(tables: &[String]) -> RegistryResult<()> {
    if tables.is_empty() {
        return Err(RegistryError::Empty);
    }

    let mut seen = BTreeSet::<&str>::new();
    for table in tables {
        if !TABLE_IDENTIFIER_RE.is_match(table) {
            return Err(RegistryError::InvalidIdentifier(table.clone()));
        }
        if !seen.insert(table.as_str()) {
            return Err(RegistryError::DuplicateTable(table.clone()));
        }
    }
    Ok(())
}

fn lookup(index: &HashMap<&str, usize>, table: &str) -> RegistryResult<usize> {
    index
        .get(table)
        .copied()
        .ok_or_else(|| RegistryError::UnknownTable(table.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{ForeignKeyEdge, RegistryError, TableRegistry};

    fn edge(child: &str, parent: &str) -> ForeignKeyEdge {
        ForeignKeyEdge::new(child, parent)
    }

    #[test]
    fn reverse_order_is_exact_reverse_of_forward_order() {
        let registry = TableRegistry::new(["a", "b", "c"]).unwrap();
        let forward = registry.forward_order().collect::<Vec<_>>();
        let mut reverse = registry.reverse_order().collect::<Vec<_>>();
        assert_eq!(forward, vec!["a", "b", "c"]);
        reverse.reverse();
        assert_eq!(reverse, forward);
    }

    #[test]
    fn new_rejects_empty_duplicate_and_malformed_tables() {
        assert_eq!(
            TableRegistry::new(Vec::<String>::new()),
            Err(RegistryError::Empty)
        );
        assert_eq!(
            TableRegistry::new(["locations", "locations"]),
            Err(RegistryError::DuplicateTable("locations".to_string()))
        );
        assert_eq!(
            TableRegistry::new(["locations", "drop table;"]),
            Err(RegistryError::InvalidIdentifier("drop table;".to_string()))
        );
    }

    #[test]
    fn with_dependencies_rejects_child_listed_before_parent() {
        let result = TableRegistry::with_dependencies(
            ["equipment", "locations"],
            &[edge("equipment", "locations")],
        );
        assert_eq!(
            result,
            Err(RegistryError::OrderViolation {
                child: "equipment".to_string(),
                parent: "locations".to_string(),
            })
        );
    }

    #[test]
    fn with_dependencies_rejects_edges_to_unregistered_tables() {
        let result =
            TableRegistry::with_dependencies(["equipment"], &[edge("equipment", "locations")]);
        assert_eq!(
            result,
            Err(RegistryError::UnknownTable("locations".to_string()))
        );
    }

    #[test]
    fn self_references_do_not_constrain_order() {
        let edges = [edge("categories", "categories")];
        assert!(TableRegistry::with_dependencies(["categories"], &edges).is_ok());
        assert!(TableRegistry::derive(["categories"], &edges).is_ok());
    }

    #[test]
    fn derive_moves_parents_ahead_and_keeps_unconstrained_order() {
        let registry = TableRegistry::derive(
            ["settings", "equipment", "locations", "categories"],
            &[edge("equipment", "locations"), edge("equipment", "categories")],
        )
        .unwrap();
        assert_eq!(
            registry.forward_order().collect::<Vec<_>>(),
            vec!["settings", "locations", "categories", "equipment"]
        );
    }

    #[test]
    fn derive_reports_every_table_in_a_cycle() {
        let result = TableRegistry::derive(
            ["persons", "missions", "equipment", "settings"],
            &[
                edge("missions", "persons"),
                edge("equipment", "missions"),
                edge("persons", "equipment"),
            ],
        );
        assert_eq!(
            result,
            Err(RegistryError::DependencyCycle(vec![
                "persons".to_string(),
                "missions".to_string(),
                "equipment".to_string(),
            ]))
        );
    }
}
