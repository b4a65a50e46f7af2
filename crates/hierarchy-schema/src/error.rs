//! Error types for schema construction, schema lookups and access-path parsing.

use thiserror::Error;

/// Errors raised while building or querying a [`Schema`](crate::Schema).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A hierarchy type was declared twice.
    #[error("duplicate hierarchy type: {0}")]
    DuplicateHierarchy(String),

    /// A hierarchy type was declared without an identifier attribute.
    #[error("hierarchy type {0} has no identifier attribute")]
    MissingIdname(String),

    /// Two declarations map to the same access name.
    ///
    /// Types are named by type name, factors as `Type.factor`.
    #[error("access name '{name}' is used by both {first} and {second}")]
    NameCollision {
        /// The colliding access name.
        name: String,
        /// Declaration that claimed the name first.
        first: String,
        /// Declaration that collided with it.
        second: String,
    },

    /// A parent declaration names a type that does not exist.
    #[error("hierarchy type {hierarchy} declares unknown parent {parent}")]
    UnknownParent {
        /// The declaring type.
        hierarchy: String,
        /// The missing parent type.
        parent: String,
    },

    /// A hierarchy type lookup failed.
    #[error("unknown hierarchy type: {0}")]
    UnknownHierarchy(String),

    /// A factor lookup failed.
    #[error("unknown factor: {0}")]
    UnknownFactor(String),

    /// A factor is owned by several types and no owner is closest.
    #[error("factor '{factor}' is ambiguous between {owners:?}")]
    AmbiguousFactor {
        /// The factor name.
        factor: String,
        /// All types declaring it.
        owners: Vec<String>,
    },

    /// No traversal path connects two types.
    #[error("no path from {from} to {to}")]
    NoPath {
        /// Start type.
        from: String,
        /// End type.
        to: String,
    },

    /// Schema document could not be decoded.
    #[cfg(feature = "serde")]
    #[error("invalid schema document: {0}")]
    Document(String),
}

/// Result type for schema operations.
pub type SchemaResult<T> = std::result::Result<T, SchemaError>;

/// Errors raised while parsing an access path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Parse error at a specific position in the input.
    #[error("parse error at position {position}: {message}")]
    Syntax {
        /// Position in the input where the error occurred.
        position: usize,
        /// Description of the error.
        message: String,
    },

    /// Input ended in the middle of a step.
    #[error("access path is incomplete: {0}")]
    Incomplete(String),

    /// Empty input provided.
    #[error("empty access path")]
    EmptyPath,
}

/// Result type for access-path parsing.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_no_path() {
        let err = SchemaError::NoPath {
            from: "Fibre".to_string(),
            to: "Survey".to_string(),
        };
        assert_eq!(err.to_string(), "no path from Fibre to Survey");
    }

    #[test]
    fn test_display_ambiguous_factor() {
        let err = SchemaError::AmbiguousFactor {
            factor: "mjd".to_string(),
            owners: vec!["OB".to_string(), "Exposure".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "factor 'mjd' is ambiguous between [\"OB\", \"Exposure\"]"
        );
    }

    #[test]
    fn test_display_parse_error() {
        let err = ParseError::Syntax {
            position: 4,
            message: "unexpected input at: '?'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "parse error at position 4: unexpected input at: '?'"
        );
    }
}
