//! Factor reads: scalars, columns, labelled rows and tables.

use std::sync::Arc;

use hierarchy_schema::{AccessPath, AccessStep, HierarchyType, Identifier, Value};

use crate::branch::{Statement, Var};
use crate::error::{BuildResult, ExecResult, IdentifierReport, QueryBuildError, QueryExecutionError};
use crate::planner::QueryPlan;
use crate::result::{FactorOutput, Output, Table, TableRow};
use crate::traits::{Cursor, ExecutionSubstrate, Row};

use super::definite::{value_at, Definite};
use super::homogeneous::{finish, order_by_identifiers};
use super::single::expect_one;
use super::{Frozen, HierarchyQuery};

/// Shape of a factor read's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorShape {
    /// One value: a singular factor of a single instance.
    Scalar,
    /// A list: a plural read from a single instance, or one value per
    /// instance of a plural query.
    Column,
    /// One labelled row: several factors of a single instance.
    Row,
    /// One labelled row per instance of a plural query.
    Table,
}

/// One projected factor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorColumn {
    /// The name the caller requested, used as the label.
    pub label: String,
    /// Declared factor name.
    pub factor: String,
    /// Type owning the factor.
    pub hierarchy: String,
    /// Variable holding the value.
    pub var: Var,
    /// Whether the hop to the owning type is plural.
    pub plural: bool,
    /// Whether values were collected into one list per row.
    pub collected: bool,
}

/// A factor read derived from a typed query.
#[derive(Debug, Clone)]
pub struct FactorQuery {
    frozen: Frozen,
    node: Var,
    hierarchy: Arc<HierarchyType>,
    shape: FactorShape,
    single: bool,
    columns: Vec<FactorColumn>,
    order: Option<Vec<Identifier>>,
}

impl FactorQuery {
    /// Reads `names` through `definite`; `labelled` selects the row/table
    /// shapes.
    pub(crate) fn read(
        this: &HierarchyQuery,
        definite: &Definite,
        names: Vec<String>,
        labelled: bool,
    ) -> BuildResult<Self> {
        let single = !this.is_plural();
        let resolved = definite.resolve_factors(&names, single)?;
        let shape = match (labelled, single) {
            (true, true) => FactorShape::Row,
            (true, false) => FactorShape::Table,
            (false, false) => FactorShape::Column,
            (false, true) if resolved.columns.iter().any(|c| c.collected) => FactorShape::Column,
            (false, true) => FactorShape::Scalar,
        };
        let step = match (labelled, names.as_slice()) {
            (false, [name]) => AccessStep::Attribute(name.clone()),
            _ => AccessStep::Columns(names),
        };
        let order = match this {
            HierarchyQuery::Identified(q) => Some(q.identifiers.clone()),
            _ => None,
        };
        Ok(Self {
            frozen: Frozen::derive(this, resolved.branch, vec![step], None),
            node: definite.node,
            hierarchy: definite.hierarchy.clone(),
            shape,
            single,
            columns: resolved.columns,
            order,
        })
    }

    /// Output shape.
    pub fn shape(&self) -> FactorShape {
        self.shape
    }

    /// Projected factors, in caller order.
    pub fn columns(&self) -> &[FactorColumn] {
        &self.columns
    }

    /// Column labels, in caller order.
    pub fn labels(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.label.as_str()).collect()
    }

    /// Type the factors were read from.
    pub fn hierarchy(&self) -> &HierarchyType {
        &self.hierarchy
    }

    /// The hierarchy query the factors were read from.
    pub fn parent(&self) -> Option<&HierarchyQuery> {
        self.frozen.parent.as_deref()
    }

    /// The access path that produced this read.
    pub fn access_path(&self) -> AccessPath {
        self.frozen.access_path()
    }

    pub(crate) fn not_traversable(&self, step: &AccessStep) -> QueryBuildError {
        QueryBuildError::FactorNotTraversable {
            step: step.to_string(),
            context: self.frozen.context(),
        }
    }

    /// Compiles the read; the node is returned first, then each factor.
    pub fn compile(&self) -> Statement {
        let mut returns = Vec::with_capacity(self.columns.len() + 1);
        returns.push(self.node);
        returns.extend(self.columns.iter().map(|c| c.var));
        self.frozen.branch.compile(returns)
    }

    /// Runs the read once.
    pub fn execute(&self, substrate: &dyn ExecutionSubstrate) -> ExecResult<Output> {
        let statement = self.compile();
        tracing::debug!(
            path = %self.access_path(),
            shape = ?self.shape,
            steps = statement.steps.len(),
            "executing factor query"
        );
        let cursor = substrate.run(&statement)?;
        self.post_process(cursor)
    }

    /// Shapes the rows of this read's statement.
    pub fn post_process(&self, cursor: Cursor) -> ExecResult<Output> {
        let source = self.parent().ok_or(QueryExecutionError::NotExecutable)?;
        let definite = source.definite().ok_or(QueryExecutionError::NotExecutable)?;
        definite.check_limit(&cursor)?;

        let positions = self
            .columns
            .iter()
            .map(|c| {
                cursor.column(c.var).ok_or_else(|| {
                    QueryExecutionError::MalformedRow(format!("cursor has no column {}", c.var))
                })
            })
            .collect::<ExecResult<Vec<usize>>>()?;

        if self.single {
            let row = expect_one(source, definite, &cursor)?;
            let output = match self.shape {
                FactorShape::Scalar => FactorOutput::Scalar(self.first(row, &positions)?),
                FactorShape::Row => FactorOutput::Row(TableRow::new(
                    self.owned_labels(),
                    values(row, &positions)?,
                )),
                _ => FactorOutput::Column(into_items(self.first(row, &positions)?)),
            };
            return Ok(Output::Factor(output));
        }

        let (rows, missing) = match &self.order {
            Some(identifiers) => {
                let node = definite.node_column(&cursor)?;
                order_by_identifiers(&cursor.rows, node, identifiers, self.hierarchy.idname())?
            }
            None => (cursor.rows.iter().collect(), IdentifierReport::new()),
        };
        let output = match self.shape {
            FactorShape::Table => {
                let values = rows
                    .iter()
                    .map(|row| values(row, &positions))
                    .collect::<ExecResult<Vec<_>>>()?;
                FactorOutput::Table(Table::new(self.owned_labels(), values))
            }
            _ => FactorOutput::Column(
                rows.iter()
                    .map(|row| self.first(row, &positions))
                    .collect::<ExecResult<Vec<_>>>()?,
            ),
        };
        finish(source, Output::Factor(output), missing)
    }

    /// Describes the lineage of this read.
    pub fn explain(&self) -> QueryPlan {
        QueryPlan::for_factor(self, self.compile())
    }

    fn owned_labels(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.label.clone()).collect()
    }

    fn first(&self, row: &Row, positions: &[usize]) -> ExecResult<Value> {
        let position = positions
            .first()
            .ok_or_else(|| QueryExecutionError::MalformedRow("no factor column".to_string()))?;
        value_at(row, *position).cloned()
    }
}

fn values(row: &Row, positions: &[usize]) -> ExecResult<Vec<Value>> {
    positions
        .iter()
        .map(|p| value_at(row, *p).cloned())
        .collect()
}

fn into_items(value: Value) -> Vec<Value> {
    match value {
        Value::List(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}
