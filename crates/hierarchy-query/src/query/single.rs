//! Queries for exactly one instance.

use hierarchy_schema::{HierarchyType, Identifier};

use crate::error::{BuildResult, ExecResult, QueryBuildError, QueryExecutionError};
use crate::traits::{Cursor, Row};

use super::definite::Definite;
use super::factor::FactorQuery;
use super::{Accessed, HierarchyQuery, Index};

/// Exactly one instance, pinned by an identifier or by a singular hop.
#[derive(Debug, Clone)]
pub struct Single {
    pub(crate) definite: Definite,
    pub(crate) identifier: Option<Identifier>,
}

impl Single {
    pub(crate) fn new(definite: Definite, identifier: Option<Identifier>) -> Self {
        Self {
            definite,
            identifier,
        }
    }

    /// The identifier this instance was pinned with, if any.
    ///
    /// `None` when the instance is singular by schema proof rather than by
    /// an explicit filter.
    pub fn identifier(&self) -> Option<&Identifier> {
        self.identifier.as_ref()
    }

    /// The hierarchy type.
    pub fn hierarchy(&self) -> &HierarchyType {
        &self.definite.hierarchy
    }

    pub(crate) fn index(&self, this: &HierarchyQuery, index: Index) -> BuildResult<Accessed> {
        match index {
            Index::Name(name) => self.definite.get(this, &name),
            Index::Names(names) => {
                FactorQuery::read(this, &self.definite, names, true).map(Accessed::Factor)
            }
            Index::Id(_) | Index::Ids(_) => Err(QueryBuildError::AlreadySingle {
                context: self.definite.frozen.context(),
            }),
        }
    }
}

/// The one row a single-instance statement must return.
///
/// Zero or several rows raise an error naming every identifier filter found
/// along the lineage of `query`.
pub(crate) fn expect_one<'a>(
    query: &HierarchyQuery,
    definite: &Definite,
    cursor: &'a Cursor,
) -> ExecResult<&'a Row> {
    match cursor.rows.as_slice() {
        [row] => Ok(row),
        [] => Err(QueryExecutionError::NotFound {
            hierarchy: definite.hierarchy.name().to_string(),
            identifiers: query.identifier_filters(),
        }),
        rows => Err(QueryExecutionError::NotUnique {
            hierarchy: definite.hierarchy.name().to_string(),
            count: rows.len(),
            identifiers: query.identifier_filters(),
        }),
    }
}
