//! The engine shared by every typed query: plurality inference, factor
//! resolution and result reconstruction.

use std::collections::BTreeMap;
use std::sync::Arc;

use hierarchy_schema::{
    AccessStep, HierarchyType, Multiplicity, PluralityProof, Resolution, Value,
};

use crate::branch::{Branch, Expression, Var};
use crate::error::{BuildResult, ExecResult, QueryBuildError, QueryExecutionError};
use crate::result::HierarchyObject;
use crate::traits::{Cursor, NodeRecord, Row};

use super::factor::{FactorColumn, FactorQuery};
use super::heterogeneous::Heterogeneous;
use super::homogeneous::Homogeneous;
use super::single::Single;
use super::{Accessed, Frozen, HierarchyQuery};

/// A query with a concrete hierarchy type and the variable holding its
/// current instance(s).
#[derive(Debug, Clone)]
pub(crate) struct Definite {
    pub(crate) frozen: Frozen,
    pub(crate) hierarchy: Arc<HierarchyType>,
    pub(crate) node: Var,
}

/// Branch extended with factor projections.
pub(crate) struct ResolvedFactors {
    pub(crate) branch: Branch,
    pub(crate) columns: Vec<FactorColumn>,
}

impl Definite {
    pub(crate) fn new(frozen: Frozen, hierarchy: Arc<HierarchyType>, node: Var) -> Self {
        Self {
            frozen,
            hierarchy,
            node,
        }
    }

    fn unknown(&self, name: &str) -> QueryBuildError {
        QueryBuildError::UnknownName {
            name: name.to_string(),
            context: self.frozen.context(),
        }
    }

    /// Proof of the hop from this type to the type `target` names.
    pub(crate) fn node_implies_plurality_of(&self, target: &str) -> BuildResult<PluralityProof> {
        let handler = &self.frozen.handler;
        let target_type = match handler.resolve(target) {
            Resolution::PluralFactor { .. } | Resolution::SingularFactor { .. } => {
                handler
                    .hierarchy_of_factor(target, Some(self.hierarchy.name()))?
                    .hierarchy
            }
            Resolution::SingularType(h) | Resolution::PluralType(h) => h.name().to_string(),
            Resolution::Unknown => match handler.schema().hierarchy(target) {
                Ok(h) => h.name().to_string(),
                Err(_) => return Err(self.unknown(target)),
            },
        };
        self.prove(&target_type)
    }

    /// Proof of the hop to a type name; identity for this type.
    fn prove(&self, target_type: &str) -> BuildResult<PluralityProof> {
        if target_type == self.hierarchy.name() {
            return Ok(PluralityProof::identity(target_type));
        }
        self.frozen
            .handler
            .node_implies_plurality_of(self.hierarchy.name(), target_type)
    }

    /// Variables bound to hierarchy instances in this value's branch.
    ///
    /// Grouping by all of them keeps one output row per input row.
    fn row_key(&self) -> Vec<Var> {
        self.frozen
            .branch
            .find_hierarchies()
            .into_iter()
            .map(|(var, _)| var)
            .collect()
    }

    /// Projects factors, traversing and re-aggregating where needed.
    ///
    /// A factor of another type is read through the implied hop. When that
    /// hop is plural (or a plural spelling is used from a single instance)
    /// the values are collected into one list per row, so every projected
    /// column stays aligned with this value's rows.
    pub(crate) fn resolve_factors(
        &self,
        names: &[String],
        single_context: bool,
    ) -> BuildResult<ResolvedFactors> {
        let handler = &self.frozen.handler;
        let row_key = self.row_key();
        let mut branch = self.frozen.branch.clone();
        let mut columns: Vec<FactorColumn> = Vec::with_capacity(names.len());

        for name in names {
            let location = match handler.resolve(name) {
                Resolution::PluralFactor { .. } | Resolution::SingularFactor { .. } => {
                    handler.hierarchy_of_factor(name, Some(self.hierarchy.name()))?
                }
                Resolution::SingularType(_) | Resolution::PluralType(_) => {
                    return Err(QueryBuildError::NotAFactor { name: name.clone() })
                }
                Resolution::Unknown => return Err(self.unknown(name)),
            };
            let proof = self.prove(&location.hierarchy)?;
            if proof.plural && !location.plural_requested {
                return Err(QueryBuildError::Ambiguous {
                    requested: name.clone(),
                    plural: handler
                        .plural_name(name)
                        .unwrap_or_else(|| name.clone()),
                    context: self.frozen.context(),
                });
            }

            let source = if proof.is_identity() {
                self.node
            } else {
                let (next, var) = branch.traverse_optional(self.node, proof.path.clone());
                branch = next;
                var
            };
            let (next, value) = branch.operate(Expression::property(source, &location.factor));
            branch = next;

            let collected = proof.plural || (location.plural_requested && single_context);
            let var = if collected {
                let mut group = row_key.clone();
                group.extend(columns.iter().map(|c| c.var));
                let (next, var) = branch.collect_one(&group, Expression::Variable(value));
                branch = next;
                var
            } else {
                value
            };

            columns.push(FactorColumn {
                label: name.clone(),
                factor: location.factor,
                hierarchy: location.hierarchy,
                var,
                plural: proof.plural,
                collected,
            });
        }

        Ok(ResolvedFactors { branch, columns })
    }

    /// Access to a related hierarchy type.
    pub(crate) fn related(&self, this: &HierarchyQuery, name: &str) -> BuildResult<HierarchyQuery> {
        let handler = &self.frozen.handler;
        let (target, singular) = match handler.resolve(name) {
            Resolution::SingularType(h) => (h, true),
            Resolution::PluralType(h) => (h, false),
            Resolution::PluralFactor { .. } | Resolution::SingularFactor { .. } => {
                return Err(QueryBuildError::NotAHierarchy {
                    name: name.to_string(),
                })
            }
            Resolution::Unknown => return Err(self.unknown(name)),
        };

        let proof = self.prove(target.name())?;
        if singular && proof.plural {
            return Err(QueryBuildError::Ambiguous {
                requested: name.to_string(),
                plural: target.plural_name().to_string(),
                context: self.frozen.context(),
            });
        }

        let (branch, node) = if proof.is_identity() {
            (self.frozen.branch.clone(), self.node)
        } else {
            self.frozen.branch.traverse(self.node, proof.path.clone())
        };
        let frozen = Frozen::derive(
            this,
            branch,
            vec![AccessStep::Attribute(name.to_string())],
            Some(proof),
        );
        let definite = Definite::new(frozen, target, node);

        if singular && !this.is_plural() {
            Ok(HierarchyQuery::Single(Single::new(definite, None)))
        } else {
            Ok(HierarchyQuery::Homogeneous(Homogeneous::new(definite)))
        }
    }

    /// Attribute access: factors first, then related types.
    pub(crate) fn get(&self, this: &HierarchyQuery, name: &str) -> BuildResult<Accessed> {
        match self.frozen.handler.resolve(name) {
            Resolution::PluralFactor { .. } | Resolution::SingularFactor { .. } => {
                FactorQuery::read(this, self, vec![name.to_string()], false).map(Accessed::Factor)
            }
            Resolution::SingularType(_) | Resolution::PluralType(_) => {
                self.related(this, name).map(Accessed::Hierarchy)
            }
            Resolution::Unknown => Err(self.unknown(name)),
        }
    }

    pub(crate) fn check_limit(&self, cursor: &Cursor) -> ExecResult<()> {
        match self.frozen.handler.config().max_results {
            Some(limit) if cursor.len() > limit => Err(QueryExecutionError::ResultTooLarge {
                count: cursor.len(),
                limit,
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn node_column(&self, cursor: &Cursor) -> ExecResult<usize> {
        cursor.column(self.node).ok_or_else(|| {
            QueryExecutionError::MalformedRow(format!("cursor has no column {}", self.node))
        })
    }

    /// Rebuilds a typed instance from a returned node.
    ///
    /// Parents are lazy queries anchored at a fresh `type[id]` root, one per
    /// declared relation; nothing is fetched here.
    pub(crate) fn reconstruct(&self, record: &NodeRecord) -> ExecResult<HierarchyObject> {
        if record.hierarchy != self.hierarchy.name() {
            return Err(QueryExecutionError::MalformedRow(format!(
                "expected a {} node, found {}",
                self.hierarchy.name(),
                record.hierarchy
            )));
        }
        let factors: BTreeMap<String, Value> = self
            .hierarchy
            .factors()
            .iter()
            .map(|f| (f.clone(), record.property(f).cloned().unwrap_or_default()))
            .collect();

        let reconstruction = |source: QueryBuildError| QueryExecutionError::Reconstruction {
            hierarchy: self.hierarchy.name().to_string(),
            source,
        };
        let root = Heterogeneous::root(self.frozen.handler.clone());
        let anchor = root
            .identify(self.hierarchy.name(), record.identifier.clone())
            .map_err(reconstruction)?;

        let mut parents = BTreeMap::new();
        for relation in self.hierarchy.parents() {
            let parent = self
                .frozen
                .handler
                .schema()
                .hierarchy(&relation.hierarchy)
                .map_err(|e| reconstruction(e.into()))?;
            let name = match relation.multiplicity {
                Multiplicity::One => parent.singular_name(),
                Multiplicity::Multiple => parent.plural_name(),
            };
            let query = anchor.related(name).map_err(reconstruction)?;
            parents.insert(name.to_string(), query);
        }

        Ok(HierarchyObject {
            hierarchy: self.hierarchy.name().to_string(),
            identifier: record.identifier.clone(),
            factors,
            parents,
        })
    }
}

/// The node in a row's cell.
pub(crate) fn node_at(row: &Row, column: usize) -> ExecResult<&NodeRecord> {
    row.cells
        .get(column)
        .and_then(|cell| cell.as_node())
        .ok_or_else(|| QueryExecutionError::MalformedRow(format!("column {column} is not a node")))
}

/// The value in a row's cell.
pub(crate) fn value_at(row: &Row, column: usize) -> ExecResult<&Value> {
    row.cells
        .get(column)
        .and_then(|cell| cell.as_value())
        .ok_or_else(|| QueryExecutionError::MalformedRow(format!("column {column} is not a value")))
}
