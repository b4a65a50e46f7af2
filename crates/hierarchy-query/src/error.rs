//! Error types for query construction and execution.
//!
//! Construction and execution fail for different reasons and are reported
//! through different types: a [`QueryBuildError`] is a caller programming
//! error raised before any store access, a [`QueryExecutionError`] is raised
//! after the terminal read returned.

use std::collections::BTreeMap;
use std::fmt;

use hierarchy_schema::{Identifier, ParseError, SchemaError};
use thiserror::Error;

use crate::branch::Var;
use crate::result::Output;

/// Errors raised while constructing a query value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryBuildError {
    /// A singular spelling was used for a hop the schema proves plural.
    #[error("'{requested}' is ambiguous from {context} because the hop is plural; use '{plural}' instead")]
    Ambiguous {
        /// The singular name that was requested.
        requested: String,
        /// The plural spelling to use instead.
        plural: String,
        /// Access path of the query the name was requested on.
        context: String,
    },

    /// The name matches no hierarchy type or factor.
    #[error("unknown name '{name}' requested from {context}")]
    UnknownName {
        /// The requested name.
        name: String,
        /// Access path of the query the name was requested on.
        context: String,
    },

    /// A bare identifier index was applied to a plural query.
    #[error("{context} is plural: use [[{identifier}]] to filter by identifier; plurality is never removed implicitly")]
    BareIdentifier {
        /// The identifier that was supplied.
        identifier: Identifier,
        /// Access path of the plural query.
        context: String,
    },

    /// An identifier filter was applied to an already identified query.
    #[error("{context} is already filtered by identifiers")]
    AlreadyIdentified {
        /// Access path of the identified query.
        context: String,
    },

    /// An identifier filter was applied to a query that is already singular.
    #[error("{context} already refers to a single instance")]
    AlreadySingle {
        /// Access path of the single query.
        context: String,
    },

    /// The access needs a hierarchy type context the query does not have.
    #[error("'{name}' needs a hierarchy context; access a hierarchy type first")]
    NoTypeContext {
        /// The requested name or index.
        name: String,
    },

    /// A hierarchy name was used where a factor is required.
    #[error("'{name}' is a hierarchy type, not a factor")]
    NotAFactor {
        /// The requested name.
        name: String,
    },

    /// A factor name was used where a hierarchy type is required.
    #[error("'{name}' is a factor, not a hierarchy type")]
    NotAHierarchy {
        /// The requested name.
        name: String,
    },

    /// An access was applied to a factor query.
    #[error("factor query {context} cannot be accessed further (attempted '{step}')")]
    FactorNotTraversable {
        /// The attempted step.
        step: String,
        /// Access path of the factor query.
        context: String,
    },

    /// Schema lookup failure.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Access-path parse failure.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Result type for query construction.
pub type BuildResult<T> = std::result::Result<T, QueryBuildError>;

/// Identifiers grouped by the identifier attribute they were filtered on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierReport(BTreeMap<String, Vec<Identifier>>);

impl IdentifierReport {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an identifier under its identifier attribute.
    pub fn push(&mut self, idname: impl Into<String>, identifier: Identifier) {
        self.0.entry(idname.into()).or_default().push(identifier);
    }

    /// Identifiers recorded for an identifier attribute.
    pub fn get(&self, idname: &str) -> Option<&[Identifier]> {
        self.0.get(idname).map(Vec::as_slice)
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over (identifier attribute, identifiers).
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Identifier>)> {
        self.0.iter()
    }
}

impl fmt::Display for IdentifierReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (idname, ids)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: [", idname)?;
            for (j, id) in ids.iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", id)?;
            }
            write!(f, "]")?;
        }
        write!(f, "}}")
    }
}

/// Errors raised by the execution substrate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubstrateError {
    /// A statement referenced a variable no earlier step bound.
    #[error("unbound variable {0}")]
    UnboundVariable(Var),

    /// A variable expected to hold a hierarchy node holds a value.
    #[error("variable {0} does not hold a hierarchy node")]
    NotANode(Var),

    /// The statement names a hierarchy type the store does not know.
    #[error("unknown hierarchy type: {0}")]
    UnknownHierarchy(String),

    /// Any other failure of the underlying store.
    #[error("store error: {0}")]
    Store(String),
}

/// Errors raised by the terminal execution of a query.
#[derive(Error, Debug)]
pub enum QueryExecutionError {
    /// The query has no hierarchy type and cannot be run.
    #[error("a heterogeneous query cannot be executed; access a hierarchy type first")]
    NotExecutable,

    /// A single-instance query matched nothing.
    #[error("no {hierarchy} found for identifiers {identifiers}")]
    NotFound {
        /// Hierarchy type that was expected.
        hierarchy: String,
        /// Every identifier filter applied along the lineage.
        identifiers: IdentifierReport,
    },

    /// A single-instance query matched more than one row.
    #[error("expected one {hierarchy} but found {count} for identifiers {identifiers}")]
    NotUnique {
        /// Hierarchy type that was expected.
        hierarchy: String,
        /// Number of rows returned.
        count: usize,
        /// Every identifier filter applied along the lineage.
        identifiers: IdentifierReport,
    },

    /// Some identifiers of an identified query matched no row.
    #[error("identifiers not found: {missing}")]
    MissingIdentifiers {
        /// Unmatched identifiers, keyed by identifier attribute.
        missing: IdentifierReport,
        /// Everything that did match, in caller order.
        partial: Box<Output>,
    },

    /// The cursor exceeded the configured result limit.
    #[error("result set too large: {count} exceeds limit {limit}")]
    ResultTooLarge {
        /// Number of rows returned.
        count: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The cursor did not have the shape the compiled statement asked for.
    #[error("malformed result row: {0}")]
    MalformedRow(String),

    /// Rebuilding lazy parent queries of a returned instance failed.
    #[error("cannot reconstruct {hierarchy}: {source}")]
    Reconstruction {
        /// Hierarchy type being reconstructed.
        hierarchy: String,
        /// The underlying construction error.
        #[source]
        source: QueryBuildError,
    },

    /// The execution substrate failed.
    #[error("substrate error: {0}")]
    Substrate(#[from] SubstrateError),
}

/// Result type for query execution.
pub type ExecResult<T> = std::result::Result<T, QueryExecutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_report_display() {
        let mut report = IdentifierReport::new();
        report.push("runid", Identifier::Int(99));
        report.push("runid", Identifier::Int(100));
        report.push("obid", Identifier::Str("x".to_string()));
        assert_eq!(report.to_string(), "{obid: [\"x\"], runid: [99, 100]}");
        assert_eq!(report.get("runid").map(|ids| ids.len()), Some(2));
        assert!(!report.is_empty());
    }

    #[test]
    fn test_ambiguous_names_plural_remedy() {
        let err = QueryBuildError::Ambiguous {
            requested: "exposure".to_string(),
            plural: "exposures".to_string(),
            context: "ob[1]".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "'exposure' is ambiguous from ob[1] because the hop is plural; use 'exposures' instead"
        );
    }

    #[test]
    fn test_bare_identifier_message() {
        let err = QueryBuildError::BareIdentifier {
            identifier: Identifier::Int(3),
            context: "runs".to_string(),
        };
        assert!(err.to_string().contains("use [[3]]"));
    }

    #[test]
    fn test_not_found_display() {
        let mut identifiers = IdentifierReport::new();
        identifiers.push("runid", Identifier::Int(5));
        let err = QueryExecutionError::NotFound {
            hierarchy: "Run".to_string(),
            identifiers,
        };
        assert_eq!(err.to_string(), "no Run found for identifiers {runid: [5]}");
    }

    #[test]
    fn test_substrate_error_converts() {
        let err: QueryExecutionError = SubstrateError::Store("offline".to_string()).into();
        assert!(matches!(err, QueryExecutionError::Substrate(_)));
        assert_eq!(err.to_string(), "substrate error: store error: offline");
    }

    #[test]
    fn test_schema_error_converts() {
        let err: QueryBuildError = SchemaError::UnknownFactor("x".to_string()).into();
        assert_eq!(err.to_string(), "unknown factor: x");
    }
}
