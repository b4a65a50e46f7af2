//! Execution results.

use std::collections::BTreeMap;

use hierarchy_schema::{Identifier, Value};

use crate::query::HierarchyQuery;

/// A reconstructed hierarchy instance.
///
/// Parent relations are lazy queries anchored at this instance; executing
/// one fetches the parent(s).
#[derive(Debug, Clone)]
pub struct HierarchyObject {
    /// Hierarchy type name.
    pub hierarchy: String,
    /// Value of the identifier attribute.
    pub identifier: Identifier,
    /// Every declared factor, `Null` where the store had no value.
    pub factors: BTreeMap<String, Value>,
    /// Lazy parent queries keyed by access name (`ob`, `surveys`).
    pub parents: BTreeMap<String, HierarchyQuery>,
}

impl HierarchyObject {
    /// A factor value.
    pub fn factor(&self, name: &str) -> Option<&Value> {
        self.factors.get(name)
    }

    /// A lazy parent query.
    pub fn parent(&self, name: &str) -> Option<&HierarchyQuery> {
        self.parents.get(name)
    }
}

/// One labelled row of values.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    labels: Vec<String>,
    values: Vec<Value>,
}

impl TableRow {
    /// Creates a row; labels and values are paired positionally.
    pub fn new(labels: Vec<String>, values: Vec<Value>) -> Self {
        Self { labels, values }
    }

    /// Value by label.
    pub fn get(&self, label: &str) -> Option<&Value> {
        self.labels
            .iter()
            .position(|l| l == label)
            .and_then(|i| self.values.get(i))
    }

    /// Labels, in caller order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Values, in label order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the row has no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Labelled rows sharing one set of labels.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    labels: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Creates a table.
    pub fn new(labels: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { labels, rows }
    }

    /// Column labels, in caller order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Raw rows.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// A row with its labels.
    pub fn row(&self, index: usize) -> Option<TableRow> {
        self.rows
            .get(index)
            .map(|values| TableRow::new(self.labels.clone(), values.clone()))
    }

    /// Every value of one column.
    pub fn column(&self, label: &str) -> Option<Vec<&Value>> {
        let index = self.labels.iter().position(|l| l == label)?;
        self.rows.iter().map(|row| row.get(index)).collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Output of a factor read.
#[derive(Debug, Clone, PartialEq)]
pub enum FactorOutput {
    /// One value.
    Scalar(Value),
    /// A list of values.
    Column(Vec<Value>),
    /// One labelled row.
    Row(TableRow),
    /// A table.
    Table(Table),
}

/// Output of a terminal execution.
#[derive(Debug, Clone)]
pub enum Output {
    /// One instance.
    Object(HierarchyObject),
    /// Instances in result order.
    Objects(Vec<HierarchyObject>),
    /// Factor values.
    Factor(FactorOutput),
}

impl Output {
    /// The instance, for single-instance queries.
    pub fn as_object(&self) -> Option<&HierarchyObject> {
        match self {
            Output::Object(object) => Some(object),
            _ => None,
        }
    }

    /// The instances, for plural queries.
    pub fn as_objects(&self) -> Option<&[HierarchyObject]> {
        match self {
            Output::Objects(objects) => Some(objects),
            _ => None,
        }
    }

    /// The factor values, for factor reads.
    pub fn as_factor(&self) -> Option<&FactorOutput> {
        match self {
            Output::Factor(output) => Some(output),
            _ => None,
        }
    }

    /// Identifiers of the returned instances, in result order.
    pub fn identifiers(&self) -> Vec<&Identifier> {
        match self {
            Output::Object(object) => vec![&object.identifier],
            Output::Objects(objects) => objects.iter().map(|o| &o.identifier).collect(),
            Output::Factor(_) => Vec::new(),
        }
    }
}
