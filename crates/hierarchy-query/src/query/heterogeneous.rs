//! The untyped root of every lineage.

use std::sync::Arc;

use hierarchy_schema::{AccessStep, HierarchyType, Identifier, Resolution, Value};

use crate::branch::{Expression, Predicate};
use crate::error::{BuildResult, QueryBuildError};
use crate::handler::Handler;

use super::definite::Definite;
use super::homogeneous::Homogeneous;
use super::single::Single;
use super::{Accessed, Frozen, HierarchyQuery, Index};

/// Entry point with no hierarchy type; not executable.
#[derive(Debug, Clone)]
pub struct Heterogeneous {
    pub(crate) frozen: Frozen,
}

impl Heterogeneous {
    pub(crate) fn root(handler: Arc<Handler>) -> Self {
        Self {
            frozen: Frozen::root(handler),
        }
    }

    fn as_query(&self) -> HierarchyQuery {
        HierarchyQuery::Heterogeneous(self.clone())
    }

    /// Every instance of a type.
    pub(crate) fn begin(&self, this: &HierarchyQuery, hierarchy: &Arc<HierarchyType>) -> HierarchyQuery {
        let (branch, node) = self.frozen.branch.begin(hierarchy.name());
        let frozen = Frozen::derive(
            this,
            branch,
            vec![AccessStep::Attribute(hierarchy.plural_name().to_string())],
            None,
        );
        HierarchyQuery::Homogeneous(Homogeneous::new(Definite::new(
            frozen,
            hierarchy.clone(),
            node,
        )))
    }

    /// Pins the one instance of `hierarchy` (type name or singular access
    /// name) whose identifier attribute equals `identifier`.
    pub fn identify(
        &self,
        hierarchy: &str,
        identifier: impl Into<Identifier>,
    ) -> BuildResult<HierarchyQuery> {
        let identifier = identifier.into();
        let hierarchy = self.frozen.handler.lookup(hierarchy)?;
        let (branch, node) = self.frozen.branch.begin(hierarchy.name());
        let (branch, data) = branch.add_data(Value::from(identifier.clone()));
        let branch = branch.filter(Predicate::Equals(
            Expression::property(node, hierarchy.idname()),
            Expression::Variable(data),
        ));
        let frozen = Frozen::derive(
            &self.as_query(),
            branch,
            vec![
                AccessStep::Attribute(hierarchy.singular_name().to_string()),
                AccessStep::Identifier(identifier.clone()),
            ],
            None,
        );
        Ok(HierarchyQuery::Single(Single::new(
            Definite::new(frozen, hierarchy, node),
            Some(identifier),
        )))
    }

    pub(crate) fn get(&self, this: &HierarchyQuery, name: &str) -> BuildResult<Accessed> {
        let handler = &self.frozen.handler;
        match handler.resolve(name) {
            Resolution::PluralFactor { .. } => {
                let location = handler.hierarchy_of_factor(name, None)?;
                let owner = handler.lookup(&location.hierarchy)?;
                self.begin(this, &owner).get(name)
            }
            Resolution::SingularFactor { factor, .. } => Err(QueryBuildError::Ambiguous {
                requested: name.to_string(),
                plural: handler.plural_name(&factor).unwrap_or(factor),
                context: self.frozen.context(),
            }),
            Resolution::PluralType(hierarchy) => Ok(Accessed::Hierarchy(self.begin(this, &hierarchy))),
            Resolution::SingularType(hierarchy) => Err(QueryBuildError::Ambiguous {
                requested: name.to_string(),
                plural: hierarchy.plural_name().to_string(),
                context: self.frozen.context(),
            }),
            Resolution::Unknown => Err(QueryBuildError::UnknownName {
                name: name.to_string(),
                context: self.frozen.context(),
            }),
        }
    }

    pub(crate) fn index(&self, this: &HierarchyQuery, index: Index) -> BuildResult<Accessed> {
        match index {
            Index::Name(name) => self.get(this, &name),
            other => Err(QueryBuildError::NoTypeContext {
                name: other.as_step().to_string(),
            }),
        }
    }
}
