//! Statement interpretation over a [`MemoryStore`].
//!
//! Rows are vectors of slots indexed by variable number. Execution starts
//! from a single empty row and applies each step in order:
//!
//! - `MATCH` fans every row out over the instances of a type
//! - `TRAVERSE` fans every row out over the nodes reachable along the
//!   route; optional traversals keep unmatched rows with a null binding
//! - `WITH` binds literals or evaluated expressions
//! - `WHERE` drops rows whose predicate is not true
//! - `collect` groups rows (first-appearance order) and gathers non-null
//!   values into lists; only group and collected variables survive

use std::collections::HashMap;

use hierarchy_query::{
    Cell, Cursor, ExecutionSubstrate, Expression, Predicate, Row, Statement, Step, SubstrateError,
    Var,
};
use hierarchy_schema::{Direction, TraversalPath, Value};
use roaring::RoaringBitmap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{MemStoreError, MemStoreResult};
use crate::store::MemoryStore;

/// What a variable holds in one working row.
#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Node(u32),
    Value(Value),
    Null,
}

/// Structural, hashable form of a value, used for grouping and comparison.
///
/// Integral floats key as integers, so `1` and `1.0` (and `0.0` and `-0.0`)
/// are one key. Every NaN is the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ValueKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(String),
    List(Vec<ValueKey>),
}

impl ValueKey {
    fn float(f: f64) -> Self {
        if f.is_nan() {
            return ValueKey::Float(f64::NAN.to_bits());
        }
        if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
            return ValueKey::Int(f as i64);
        }
        ValueKey::Float(f.to_bits())
    }
}

impl From<&Value> for ValueKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Int(i) => ValueKey::Int(*i),
            Value::Float(f) => ValueKey::float(*f),
            Value::Str(s) => ValueKey::Str(s.clone()),
            Value::List(items) => ValueKey::List(items.iter().map(ValueKey::from).collect()),
        }
    }
}

/// Hashable stand-in for a slot when grouping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupPart {
    Node(u32),
    Null,
    Value(ValueKey),
}

impl From<&Slot> for GroupPart {
    fn from(slot: &Slot) -> Self {
        match slot {
            Slot::Node(idx) => GroupPart::Node(*idx),
            Slot::Null | Slot::Value(Value::Null) => GroupPart::Null,
            Slot::Value(value) => GroupPart::Value(ValueKey::from(value)),
        }
    }
}

type WorkRow = Vec<Option<Slot>>;

/// Interprets one statement against a store.
pub(crate) struct Interpreter<'a> {
    store: &'a MemoryStore,
    width: usize,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(store: &'a MemoryStore, statement: &Statement) -> Self {
        let width = statement
            .steps
            .iter()
            .flat_map(bound_vars)
            .chain(statement.returns.iter().copied())
            .map(|v| v.index() as usize + 1)
            .max()
            .unwrap_or(0);
        Self { store, width }
    }

    pub(crate) fn run(&self, statement: &Statement) -> MemStoreResult<Cursor> {
        let mut rows: Vec<WorkRow> = vec![vec![None; self.width]];
        for step in &statement.steps {
            rows = self.apply(step, rows)?;
            tracing::trace!(step = %step, rows = rows.len(), "applied step");
        }
        let rows = rows
            .iter()
            .map(|row| self.output(row, &statement.returns))
            .collect::<MemStoreResult<Vec<Row>>>()?;
        Ok(Cursor::new(statement.returns.clone(), rows))
    }

    fn apply(&self, step: &Step, rows: Vec<WorkRow>) -> MemStoreResult<Vec<WorkRow>> {
        match step {
            Step::Match { var, hierarchy } => {
                let instances = self.store.instances(hierarchy)?;
                let mut out = Vec::with_capacity(rows.len() * instances.len() as usize);
                for row in &rows {
                    for idx in instances {
                        out.push(bind(row.clone(), *var, Slot::Node(idx)));
                    }
                }
                Ok(out)
            }
            Step::Traverse {
                from,
                to,
                path,
                optional,
            } => {
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    let reached = match slot(&row, *from)? {
                        Slot::Node(idx) => self.reach(*idx, path),
                        Slot::Null => RoaringBitmap::new(),
                        Slot::Value(_) => return Err(MemStoreError::NotANode(*from)),
                    };
                    if reached.is_empty() {
                        if *optional {
                            out.push(bind(row, *to, Slot::Null));
                        }
                        continue;
                    }
                    for idx in &reached {
                        out.push(bind(row.clone(), *to, Slot::Node(idx)));
                    }
                }
                Ok(out)
            }
            Step::Data { var, value } => Ok(rows
                .into_iter()
                .map(|row| bind(row, *var, Slot::Value(value.clone())))
                .collect()),
            Step::Filter(predicate) => self.filter(predicate, rows),
            Step::Operate { var, expression } => rows
                .into_iter()
                .map(|row| {
                    let value = self.eval(&row, expression)?;
                    Ok(bind(row, *var, Slot::Value(value)))
                })
                .collect::<MemStoreResult<Vec<WorkRow>>>(),
            Step::Collect { group, collected } => self.collect(group, collected, rows),
        }
    }

    /// Nodes reachable from `start` along every hop of `path`.
    fn reach(&self, start: u32, path: &TraversalPath) -> RoaringBitmap {
        let mut frontier = RoaringBitmap::new();
        frontier.insert(start);
        for hop in &path.hops {
            let mut next = RoaringBitmap::new();
            for idx in &frontier {
                let edges = match hop.direction {
                    Direction::ToParent => self.store.parents_of(idx, &hop.to),
                    Direction::ToChild => self.store.children_of(idx, &hop.to),
                };
                if let Some(edges) = edges {
                    next |= edges;
                }
            }
            if next.is_empty() {
                return next;
            }
            frontier = next;
        }
        frontier
    }

    #[cfg(not(feature = "parallel"))]
    fn filter(&self, predicate: &Predicate, rows: Vec<WorkRow>) -> MemStoreResult<Vec<WorkRow>> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            if self.test(&row, predicate)? {
                out.push(row);
            }
        }
        Ok(out)
    }

    #[cfg(feature = "parallel")]
    fn filter(&self, predicate: &Predicate, rows: Vec<WorkRow>) -> MemStoreResult<Vec<WorkRow>> {
        let kept = rows
            .into_par_iter()
            .map(|row| Ok(self.test(&row, predicate)?.then_some(row)))
            .collect::<MemStoreResult<Vec<Option<WorkRow>>>>()?;
        Ok(kept.into_iter().flatten().collect())
    }

    fn test(&self, row: &WorkRow, predicate: &Predicate) -> MemStoreResult<bool> {
        match predicate {
            Predicate::Equals(left, right) => {
                let left = self.eval(row, left)?;
                if left.is_null() {
                    return Ok(false);
                }
                Ok(ValueKey::from(&left) == ValueKey::from(&self.eval(row, right)?))
            }
            Predicate::In { item, list } => {
                let item = self.eval(row, item)?;
                let list = self.eval(row, list)?;
                let values = list
                    .as_list()
                    .ok_or_else(|| MemStoreError::NotAList(list.to_string()))?;
                if item.is_null() {
                    return Ok(false);
                }
                let key = ValueKey::from(&item);
                Ok(values.iter().any(|value| ValueKey::from(value) == key))
            }
        }
    }

    fn eval(&self, row: &WorkRow, expression: &Expression) -> MemStoreResult<Value> {
        match expression {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Variable(var) => match slot(row, *var)? {
                Slot::Value(value) => Ok(value.clone()),
                Slot::Null => Ok(Value::Null),
                Slot::Node(_) => Err(MemStoreError::NotAValue(*var)),
            },
            Expression::Property { node, name } => match slot(row, *node)? {
                Slot::Node(idx) => self.store.property(*idx, name),
                Slot::Null => Ok(Value::Null),
                Slot::Value(_) => Err(MemStoreError::NotANode(*node)),
            },
        }
    }

    fn collect(
        &self,
        group: &[Var],
        collected: &[(Var, Expression)],
        rows: Vec<WorkRow>,
    ) -> MemStoreResult<Vec<WorkRow>> {
        let mut index: HashMap<Vec<GroupPart>, usize> = HashMap::new();
        let mut groups: Vec<(Vec<Slot>, Vec<Vec<Value>>)> = Vec::new();

        for row in &rows {
            let key_slots = group
                .iter()
                .map(|var| slot(row, *var).cloned())
                .collect::<MemStoreResult<Vec<Slot>>>()?;
            let key: Vec<GroupPart> = key_slots.iter().map(GroupPart::from).collect();
            let position = match index.get(&key) {
                Some(&position) => position,
                None => {
                    groups.push((key_slots, vec![Vec::new(); collected.len()]));
                    index.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };
            for (i, (_, expression)) in collected.iter().enumerate() {
                let value = self.eval(row, expression)?;
                if !value.is_null() {
                    groups[position].1[i].push(value);
                }
            }
        }

        // Aggregating without keys over no rows still yields one row.
        if groups.is_empty() && group.is_empty() {
            groups.push((Vec::new(), vec![Vec::new(); collected.len()]));
        }

        Ok(groups
            .into_iter()
            .map(|(keys, lists)| {
                let mut row: WorkRow = vec![None; self.width];
                for (var, key) in group.iter().zip(keys) {
                    row = bind(row, *var, key);
                }
                for ((var, _), list) in collected.iter().zip(lists) {
                    row = bind(row, *var, Slot::Value(Value::List(list)));
                }
                row
            })
            .collect())
    }

    fn output(&self, row: &WorkRow, returns: &[Var]) -> MemStoreResult<Row> {
        returns
            .iter()
            .map(|var| match slot(row, *var)? {
                Slot::Node(idx) => self.store.record_at(*idx).map(Cell::Node),
                Slot::Value(value) => Ok(Cell::Value(value.clone())),
                Slot::Null => Ok(Cell::Value(Value::Null)),
            })
            .collect::<MemStoreResult<Vec<Cell>>>()
            .map(Row::new)
    }
}

fn slot(row: &WorkRow, var: Var) -> MemStoreResult<&Slot> {
    row.get(var.index() as usize)
        .and_then(Option::as_ref)
        .ok_or(MemStoreError::UnboundVariable(var))
}

fn bind(mut row: WorkRow, var: Var, value: Slot) -> WorkRow {
    let i = var.index() as usize;
    if i >= row.len() {
        row.resize(i + 1, None);
    }
    row[i] = Some(value);
    row
}

/// Variables a step binds.
fn bound_vars(step: &Step) -> Vec<Var> {
    match step {
        Step::Match { var, .. } | Step::Data { var, .. } | Step::Operate { var, .. } => vec![*var],
        Step::Traverse { to, .. } => vec![*to],
        Step::Filter(_) => Vec::new(),
        Step::Collect { collected, .. } => collected.iter().map(|(var, _)| *var).collect(),
    }
}

impl ExecutionSubstrate for MemoryStore {
    fn run(&self, statement: &Statement) -> Result<Cursor, SubstrateError> {
        tracing::debug!(steps = statement.steps.len(), "running statement");
        let cursor = Interpreter::new(self, statement).run(statement)?;
        self.counters.record(cursor.len());
        tracing::debug!(rows = cursor.len(), "statement complete");
        Ok(cursor)
    }
}
