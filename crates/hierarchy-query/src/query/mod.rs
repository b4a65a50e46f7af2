//! Immutable query values.
//!
//! Every access on a query value returns a new value whose parent is the
//! value it was derived from. Nothing is mutated and nothing touches a store
//! until [`HierarchyQuery::execute`] (or [`FactorQuery::execute`]) is called.
//!
//! ```text
//! Heterogeneous ──name──► Homogeneous ──[[ids]]──► Identified
//!       │                      │                       │
//!    type[id]               .name                   .name
//!       ▼                      ▼                       ▼
//!    Single ──.name──► Single | Homogeneous | FactorQuery
//! ```

mod definite;
mod factor;
mod heterogeneous;
mod homogeneous;
mod single;

use std::fmt;
use std::sync::Arc;

use hierarchy_schema::{AccessPath, AccessStep, HierarchyType, Identifier, PluralityProof};

use crate::branch::{Branch, Statement};
use crate::error::{BuildResult, ExecResult, IdentifierReport, QueryBuildError, QueryExecutionError};
use crate::handler::Handler;
use crate::planner::QueryPlan;
use crate::result::Output;
use crate::traits::{Cursor, ExecutionSubstrate};

pub(crate) use definite::Definite;
pub use factor::{FactorColumn, FactorQuery, FactorShape};
pub use heterogeneous::Heterogeneous;
pub use homogeneous::{Homogeneous, Identified};
pub use single::Single;

/// State shared by every query value.
#[derive(Clone)]
pub(crate) struct Frozen {
    pub(crate) handler: Arc<Handler>,
    pub(crate) branch: Branch,
    pub(crate) parent: Option<Arc<HierarchyQuery>>,
    /// Access steps that produced this value from its parent.
    pub(crate) steps: Vec<AccessStep>,
    /// Proof of the hop that produced this value, if it crossed the schema.
    pub(crate) proof: Option<PluralityProof>,
}

impl Frozen {
    pub(crate) fn root(handler: Arc<Handler>) -> Self {
        Self {
            handler,
            branch: Branch::new(),
            parent: None,
            steps: Vec::new(),
            proof: None,
        }
    }

    pub(crate) fn derive(
        parent: &HierarchyQuery,
        branch: Branch,
        steps: Vec<AccessStep>,
        proof: Option<PluralityProof>,
    ) -> Self {
        let frozen = parent.frozen();
        Self {
            handler: frozen.handler.clone(),
            branch,
            parent: Some(Arc::new(parent.clone())),
            steps,
            proof,
        }
    }

    pub(crate) fn access_path(&self) -> AccessPath {
        let mut chunks = vec![self.steps.as_slice()];
        let mut cursor = self.parent.as_deref();
        while let Some(query) = cursor {
            chunks.push(query.frozen().steps.as_slice());
            cursor = query.frozen().parent.as_deref();
        }
        AccessPath::new(chunks.into_iter().rev().flatten().cloned().collect())
    }

    /// Access path rendered for error messages.
    pub(crate) fn context(&self) -> String {
        let path = self.access_path();
        if path.steps.is_empty() {
            "root".to_string()
        } else {
            path.to_string()
        }
    }
}

impl fmt::Debug for Frozen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frozen")
            .field("path", &self.access_path().to_string())
            .field("steps", &self.branch.len())
            .finish()
    }
}

/// An index applied with `[...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Index {
    /// `['name']` written as a single name: same as attribute access.
    Name(String),
    /// `['a', 'b']`: a labelled row or table.
    Names(Vec<String>),
    /// `[id]`: pins one instance.
    Id(Identifier),
    /// `[[id, ...]]`: restricts membership, keeping plurality.
    Ids(Vec<Identifier>),
}

impl Index {
    /// Builds an [`Index::Names`].
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Index::Names(names.into_iter().map(Into::into).collect())
    }

    /// Builds an [`Index::Ids`].
    pub fn ids<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Identifier>,
    {
        Index::Ids(ids.into_iter().map(Into::into).collect())
    }

    pub(crate) fn as_step(&self) -> AccessStep {
        match self {
            Index::Name(name) => AccessStep::Columns(vec![name.clone()]),
            Index::Names(names) => AccessStep::Columns(names.clone()),
            Index::Id(id) => AccessStep::Identifier(id.clone()),
            Index::Ids(ids) => AccessStep::Identifiers(ids.clone()),
        }
    }
}

/// A hierarchy query: the closed set of query kinds.
#[derive(Debug, Clone)]
pub enum HierarchyQuery {
    /// The untyped root.
    Heterogeneous(Heterogeneous),
    /// Exactly one instance.
    Single(Single),
    /// Every instance of a type reachable here.
    Homogeneous(Homogeneous),
    /// A homogeneous query restricted to an ordered identifier list.
    Identified(Identified),
}

impl HierarchyQuery {
    pub(crate) fn frozen(&self) -> &Frozen {
        match self {
            HierarchyQuery::Heterogeneous(q) => &q.frozen,
            HierarchyQuery::Single(q) => &q.definite.frozen,
            HierarchyQuery::Homogeneous(q) => &q.definite.frozen,
            HierarchyQuery::Identified(q) => &q.definite.frozen,
        }
    }

    pub(crate) fn definite(&self) -> Option<&Definite> {
        match self {
            HierarchyQuery::Heterogeneous(_) => None,
            HierarchyQuery::Single(q) => Some(&q.definite),
            HierarchyQuery::Homogeneous(q) => Some(&q.definite),
            HierarchyQuery::Identified(q) => Some(&q.definite),
        }
    }

    /// Short name of the query kind.
    pub fn kind(&self) -> &'static str {
        match self {
            HierarchyQuery::Heterogeneous(_) => "Heterogeneous",
            HierarchyQuery::Single(_) => "Single",
            HierarchyQuery::Homogeneous(_) => "Homogeneous",
            HierarchyQuery::Identified(_) => "Identified",
        }
    }

    /// The hierarchy type, for typed queries.
    pub fn hierarchy(&self) -> Option<&HierarchyType> {
        self.definite().map(|d| d.hierarchy.as_ref())
    }

    /// Returns true if the query can yield more than one instance.
    pub fn is_plural(&self) -> bool {
        matches!(
            self,
            HierarchyQuery::Homogeneous(_) | HierarchyQuery::Identified(_)
        )
    }

    /// The value this one was derived from.
    pub fn parent(&self) -> Option<&HierarchyQuery> {
        self.frozen().parent.as_deref()
    }

    /// This value followed by its ancestors, ending at the root.
    pub fn lineage(&self) -> Lineage<'_> {
        Lineage { next: Some(self) }
    }

    /// The access path that produced this value.
    pub fn access_path(&self) -> AccessPath {
        self.frozen().access_path()
    }

    /// The handler this value was built from.
    pub fn handler(&self) -> &Arc<Handler> {
        &self.frozen().handler
    }

    /// Proof of the hop from this value's type to `target`.
    ///
    /// `target` may be a factor (mapped to its owning type), a type access
    /// name or a type name.
    pub fn node_implies_plurality_of(&self, target: &str) -> BuildResult<PluralityProof> {
        match self.definite() {
            Some(definite) => definite.node_implies_plurality_of(target),
            None => Err(QueryBuildError::NoTypeContext {
                name: target.to_string(),
            }),
        }
    }

    /// Attribute access: a related type or a factor.
    pub fn get(&self, name: &str) -> BuildResult<Accessed> {
        match self {
            HierarchyQuery::Heterogeneous(q) => q.get(self, name),
            _ => match self.definite() {
                Some(definite) => definite.get(self, name),
                None => Err(QueryBuildError::NoTypeContext {
                    name: name.to_string(),
                }),
            },
        }
    }

    /// Index access.
    pub fn index(&self, index: Index) -> BuildResult<Accessed> {
        match self {
            HierarchyQuery::Heterogeneous(q) => q.index(self, index),
            HierarchyQuery::Single(q) => q.index(self, index),
            HierarchyQuery::Homogeneous(q) => q.index(self, index),
            HierarchyQuery::Identified(q) => q.index(self, index),
        }
    }

    /// Access to a related hierarchy type by its singular or plural name.
    pub fn related(&self, name: &str) -> BuildResult<HierarchyQuery> {
        match self.definite() {
            Some(definite) => definite.related(self, name),
            None => match self.get(name)? {
                Accessed::Hierarchy(query) => Ok(query),
                Accessed::Factor(_) => Err(QueryBuildError::NotAHierarchy {
                    name: name.to_string(),
                }),
            },
        }
    }

    /// Reads several factors at once as a labelled row or table.
    pub fn factors<S: AsRef<str>>(&self, names: &[S]) -> BuildResult<FactorQuery> {
        let names = names.iter().map(|n| n.as_ref().to_string()).collect();
        match self.index(Index::Names(names))? {
            Accessed::Factor(query) => Ok(query),
            Accessed::Hierarchy(_) => Err(QueryBuildError::NoTypeContext {
                name: self.frozen().context(),
            }),
        }
    }

    /// Compiles the branch into a statement returning this value's node.
    pub fn compile(&self) -> ExecResult<Statement> {
        match self.definite() {
            Some(definite) => Ok(definite.frozen.branch.compile(vec![definite.node])),
            None => Err(QueryExecutionError::NotExecutable),
        }
    }

    /// Runs the query once and reconstructs typed instances.
    pub fn execute(&self, substrate: &dyn ExecutionSubstrate) -> ExecResult<Output> {
        let statement = self.compile()?;
        tracing::debug!(
            path = %self.access_path(),
            kind = self.kind(),
            steps = statement.steps.len(),
            "executing hierarchy query"
        );
        let cursor = substrate.run(&statement)?;
        self.post_process(cursor)
    }

    /// Reconstructs typed instances from the rows of this value's statement.
    pub fn post_process(&self, cursor: Cursor) -> ExecResult<Output> {
        let Some(definite) = self.definite() else {
            return Err(QueryExecutionError::NotExecutable);
        };
        definite.check_limit(&cursor)?;
        let column = definite.node_column(&cursor)?;
        match self {
            HierarchyQuery::Heterogeneous(_) => Err(QueryExecutionError::NotExecutable),
            HierarchyQuery::Single(_) => {
                let row = single::expect_one(self, definite, &cursor)?;
                let node = definite::node_at(row, column)?;
                Ok(Output::Object(definite.reconstruct(node)?))
            }
            HierarchyQuery::Homogeneous(_) => {
                let objects = cursor
                    .rows
                    .iter()
                    .map(|row| definite.reconstruct(definite::node_at(row, column)?))
                    .collect::<ExecResult<Vec<_>>>()?;
                Ok(Output::Objects(objects))
            }
            HierarchyQuery::Identified(q) => {
                let (rows, missing) = q.order_rows(&cursor.rows, column)?;
                let objects = rows
                    .into_iter()
                    .map(|row| definite.reconstruct(definite::node_at(row, column)?))
                    .collect::<ExecResult<Vec<_>>>()?;
                homogeneous::finish(self, Output::Objects(objects), missing)
            }
        }
    }

    /// Describes the lineage of this value.
    pub fn explain(&self) -> QueryPlan {
        QueryPlan::from_lineage(self, self.compile().ok())
    }

    /// Every identifier filter applied along the lineage, oldest first.
    pub fn identifier_filters(&self) -> IdentifierReport {
        let mut chain: Vec<&HierarchyQuery> = self.lineage().collect();
        chain.reverse();
        let mut report = IdentifierReport::new();
        for query in chain {
            match query {
                HierarchyQuery::Single(q) => {
                    if let Some(id) = &q.identifier {
                        report.push(q.definite.hierarchy.idname(), id.clone());
                    }
                }
                HierarchyQuery::Identified(q) => {
                    for id in &q.identifiers {
                        report.push(q.definite.hierarchy.idname(), id.clone());
                    }
                }
                _ => {}
            }
        }
        report
    }
}

/// Iterator over a value and its ancestors.
pub struct Lineage<'a> {
    next: Option<&'a HierarchyQuery>,
}

impl<'a> Iterator for Lineage<'a> {
    type Item = &'a HierarchyQuery;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}

/// The result of an access: another hierarchy query or a factor read.
#[derive(Debug, Clone)]
pub enum Accessed {
    /// A hierarchy query.
    Hierarchy(HierarchyQuery),
    /// A factor read.
    Factor(FactorQuery),
}

impl Accessed {
    /// Attribute access.
    pub fn get(&self, name: &str) -> BuildResult<Accessed> {
        match self {
            Accessed::Hierarchy(query) => query.get(name),
            Accessed::Factor(query) => Err(query.not_traversable(&AccessStep::Attribute(
                name.to_string(),
            ))),
        }
    }

    /// Index access.
    pub fn index(&self, index: Index) -> BuildResult<Accessed> {
        match self {
            Accessed::Hierarchy(query) => query.index(index),
            Accessed::Factor(query) => Err(query.not_traversable(&index.as_step())),
        }
    }

    /// Applies one parsed access step.
    pub fn apply(&self, step: &AccessStep) -> BuildResult<Accessed> {
        match step {
            AccessStep::Attribute(name) => self.get(name),
            AccessStep::Identifier(id) => self.index(Index::Id(id.clone())),
            AccessStep::Identifiers(ids) => self.index(Index::Ids(ids.clone())),
            AccessStep::Columns(names) => self.index(Index::Names(names.clone())),
        }
    }

    /// The hierarchy query, if this is one.
    pub fn as_hierarchy(&self) -> Option<&HierarchyQuery> {
        match self {
            Accessed::Hierarchy(query) => Some(query),
            Accessed::Factor(_) => None,
        }
    }

    /// The factor query, if this is one.
    pub fn as_factor(&self) -> Option<&FactorQuery> {
        match self {
            Accessed::Hierarchy(_) => None,
            Accessed::Factor(query) => Some(query),
        }
    }

    /// Converts into the hierarchy query, if this is one.
    pub fn into_hierarchy(self) -> Option<HierarchyQuery> {
        match self {
            Accessed::Hierarchy(query) => Some(query),
            Accessed::Factor(_) => None,
        }
    }

    /// Converts into the factor query, if this is one.
    pub fn into_factor(self) -> Option<FactorQuery> {
        match self {
            Accessed::Hierarchy(_) => None,
            Accessed::Factor(query) => Some(query),
        }
    }

    /// The access path that produced this value.
    pub fn access_path(&self) -> AccessPath {
        match self {
            Accessed::Hierarchy(query) => query.access_path(),
            Accessed::Factor(query) => query.access_path(),
        }
    }

    /// Compiles the underlying query.
    pub fn compile(&self) -> ExecResult<Statement> {
        match self {
            Accessed::Hierarchy(query) => query.compile(),
            Accessed::Factor(query) => Ok(query.compile()),
        }
    }

    /// Runs the underlying query.
    pub fn execute(&self, substrate: &dyn ExecutionSubstrate) -> ExecResult<Output> {
        match self {
            Accessed::Hierarchy(query) => query.execute(substrate),
            Accessed::Factor(query) => query.execute(substrate),
        }
    }

    /// Describes the underlying query.
    pub fn explain(&self) -> QueryPlan {
        match self {
            Accessed::Hierarchy(query) => query.explain(),
            Accessed::Factor(query) => query.explain(),
        }
    }
}
