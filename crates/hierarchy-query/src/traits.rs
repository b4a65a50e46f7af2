//! Traits for statement execution.
//!
//! This module defines the [`ExecutionSubstrate`] trait that must be
//! implemented by any store that wants to run compiled query statements.
//!
//! # Architecture Note
//!
//! This crate intentionally does NOT depend on a concrete store. The trait
//! is defined here; implementations live in the store's own crate (see
//! `hierarchy-memstore` for the in-memory reference store).
//!
//! # Example: Implementing ExecutionSubstrate
//!
//! ```ignore
//! use hierarchy_query::{Cursor, ExecutionSubstrate, Statement, SubstrateError};
//!
//! impl ExecutionSubstrate for MyGraphDriver {
//!     fn run(&self, statement: &Statement) -> Result<Cursor, SubstrateError> {
//!         let text = statement.to_string();
//!         self.session()
//!             .run(&text)
//!             .map(|rows| into_cursor(statement, rows))
//!             .map_err(|e| SubstrateError::Store(e.to_string()))
//!     }
//! }
//! ```

use std::collections::BTreeMap;

use hierarchy_schema::{Identifier, Value};

use crate::branch::{Statement, Var};
use crate::error::SubstrateError;

/// A hierarchy instance as returned by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    /// Hierarchy type name.
    pub hierarchy: String,
    /// Value of the type's identifier attribute.
    pub identifier: Identifier,
    /// Factor values by factor name.
    pub properties: BTreeMap<String, Value>,
}

impl NodeRecord {
    /// Factor value, or `None` if the store returned no such property.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

/// One cell of a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// A hierarchy instance.
    Node(NodeRecord),
    /// A scalar or list value.
    Value(Value),
}

impl Cell {
    /// Returns the node, if this cell holds one.
    pub fn as_node(&self) -> Option<&NodeRecord> {
        match self {
            Cell::Node(node) => Some(node),
            Cell::Value(_) => None,
        }
    }

    /// Returns the value, if this cell holds one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Cell::Node(_) => None,
            Cell::Value(value) => Some(value),
        }
    }
}

/// One result row; cells follow the statement's `returns` order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    /// Cells in column order.
    pub cells: Vec<Cell>,
}

impl Row {
    /// Creates a row from its cells.
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }
}

/// Fully materialized result of running a statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cursor {
    /// Column variables, in order.
    pub columns: Vec<Var>,
    /// Result rows.
    pub rows: Vec<Row>,
}

impl Cursor {
    /// Creates a cursor.
    pub fn new(columns: Vec<Var>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column variable.
    pub fn column(&self, var: Var) -> Option<usize> {
        self.columns.iter().position(|c| *c == var)
    }
}

/// Runs compiled statements against a store.
///
/// Implementations must be safe to share between threads: sibling queries
/// may be executed concurrently against the same substrate.
pub trait ExecutionSubstrate: Send + Sync {
    /// Runs a statement and materializes every row.
    fn run(&self, statement: &Statement) -> Result<Cursor, SubstrateError>;
}
