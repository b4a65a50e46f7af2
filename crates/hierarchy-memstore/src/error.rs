//! Error types for the in-memory store.

use hierarchy_query::{SubstrateError, Var};
use hierarchy_schema::{Identifier, SchemaError};
use thiserror::Error;

/// Errors raised while loading the store or interpreting a statement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemStoreError {
    /// The schema has no such hierarchy type.
    #[error("unknown hierarchy type: {0}")]
    UnknownHierarchy(String),

    /// A factor not declared by the node's type.
    #[error("hierarchy type {hierarchy} has no factor '{factor}'")]
    UnknownFactor {
        /// Node type.
        hierarchy: String,
        /// Offending factor.
        factor: String,
    },

    /// The identifier attribute passed as a factor value.
    #[error("'{factor}' is the identifier attribute of {hierarchy}; pass it as the identifier")]
    IdentifierFactor {
        /// Node type.
        hierarchy: String,
        /// The identifier attribute.
        factor: String,
    },

    /// An identifier inserted twice for one type.
    #[error("{hierarchy} {identifier} already exists")]
    DuplicateIdentifier {
        /// Node type.
        hierarchy: String,
        /// Repeated identifier.
        identifier: Identifier,
    },

    /// A node handle that does not belong to this store.
    #[error("unknown node #{0}")]
    UnknownNode(u32),

    /// A link between types with no declared parent relation.
    #[error("{child} does not declare {parent} as a parent")]
    UndeclaredParent {
        /// Child type.
        child: String,
        /// Parent type.
        parent: String,
    },

    /// A second parent for a relation declared with multiplicity one.
    #[error("{child} {identifier} already has a {parent}")]
    ParentAlreadySet {
        /// Child type.
        child: String,
        /// Child identifier.
        identifier: Identifier,
        /// Parent type.
        parent: String,
    },

    /// A statement read a variable no earlier step bound.
    #[error("unbound variable {0}")]
    UnboundVariable(Var),

    /// A statement used a value where a node was expected.
    #[error("variable {0} does not hold a hierarchy node")]
    NotANode(Var),

    /// A statement used a node where a value was expected.
    #[error("variable {0} holds a node, not a value")]
    NotAValue(Var),

    /// The right-hand side of `IN` is not a list.
    #[error("IN expects a list, found {0}")]
    NotAList(String),
}

impl From<SchemaError> for MemStoreError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::UnknownHierarchy(name) => MemStoreError::UnknownHierarchy(name),
            other => MemStoreError::UnknownHierarchy(other.to_string()),
        }
    }
}

impl From<MemStoreError> for SubstrateError {
    fn from(err: MemStoreError) -> Self {
        match err {
            MemStoreError::UnknownHierarchy(name) => SubstrateError::UnknownHierarchy(name),
            MemStoreError::UnboundVariable(var) => SubstrateError::UnboundVariable(var),
            MemStoreError::NotANode(var) => SubstrateError::NotANode(var),
            other => SubstrateError::Store(other.to_string()),
        }
    }
}

/// Result type for store operations.
pub type MemStoreResult<T> = std::result::Result<T, MemStoreError>;
