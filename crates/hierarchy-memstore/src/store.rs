//! Typed node storage with per-type roaring indexes.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use hierarchy_query::NodeRecord;
use hierarchy_schema::{HierarchyType, Identifier, Multiplicity, Schema, Value};
use roaring::RoaringBitmap;

use crate::error::{MemStoreError, MemStoreResult};
use crate::registry::NodeRegistry;
use crate::stats::{RunCounters, StoreStats};

/// Handle of a stored node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Compact index of the node.
    pub fn index(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone)]
struct StoredNode {
    hierarchy: Arc<HierarchyType>,
    identifier: Identifier,
    factors: BTreeMap<String, Value>,
    /// parent type -> parent indices
    parents: HashMap<String, RoaringBitmap>,
    /// child type -> child indices
    children: HashMap<String, RoaringBitmap>,
}

/// An in-memory hierarchy store.
///
/// Nodes are validated against the schema on insert: the type must exist,
/// factors must be declared by it, identifiers are unique per type and
/// links must follow a declared parent relation (at most one parent for a
/// relation of multiplicity one).
///
/// # Example
///
/// ```
/// use hierarchy_memstore::MemoryStore;
/// use hierarchy_schema::{HierarchyType, Schema, Value};
///
/// let schema = Schema::builder()
///     .hierarchy(HierarchyType::builder("OB").idname("obid"))
///     .hierarchy(
///         HierarchyType::builder("Run")
///             .idname("runid")
///             .factor("camera")
///             .parent("OB"),
///     )
///     .build()
///     .unwrap();
///
/// let mut store = MemoryStore::new(schema);
/// let ob = store.insert_node("OB", 1).unwrap();
/// let run = store.insert("Run", 1002, [("camera", Value::from("red"))]).unwrap();
/// store.link(run, ob).unwrap();
///
/// assert_eq!(store.len(), 2);
/// assert_eq!(store.stats().link_count, 1);
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    schema: Arc<Schema>,
    registry: NodeRegistry,
    nodes: Vec<StoredNode>,
    by_type: HashMap<String, RoaringBitmap>,
    link_count: usize,
    pub(crate) counters: RunCounters,
}

impl MemoryStore {
    /// Creates an empty store for a schema.
    pub fn new(schema: impl Into<Arc<Schema>>) -> Self {
        let schema = schema.into();
        let by_type = schema
            .hierarchies()
            .map(|h| (h.name().to_string(), RoaringBitmap::new()))
            .collect();
        Self {
            schema,
            registry: NodeRegistry::new(),
            nodes: Vec::new(),
            by_type,
            link_count: 0,
            counters: RunCounters::default(),
        }
    }

    /// The schema nodes are validated against.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Inserts a node with factor values.
    pub fn insert<I, K, V>(
        &mut self,
        hierarchy: &str,
        identifier: impl Into<Identifier>,
        factors: I,
    ) -> MemStoreResult<NodeId>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let hierarchy = self.schema.hierarchy(hierarchy)?.clone();
        let identifier = identifier.into();
        if self.registry.contains(hierarchy.name(), &identifier) {
            return Err(MemStoreError::DuplicateIdentifier {
                hierarchy: hierarchy.name().to_string(),
                identifier,
            });
        }

        let mut values = BTreeMap::new();
        for (factor, value) in factors {
            let factor = factor.into();
            if factor == hierarchy.idname() {
                return Err(MemStoreError::IdentifierFactor {
                    hierarchy: hierarchy.name().to_string(),
                    factor,
                });
            }
            if !hierarchy.has_factor(&factor) {
                return Err(MemStoreError::UnknownFactor {
                    hierarchy: hierarchy.name().to_string(),
                    factor,
                });
            }
            values.insert(factor, value.into());
        }

        let idx = self.registry.register(hierarchy.name(), identifier.clone());
        self.by_type
            .entry(hierarchy.name().to_string())
            .or_default()
            .insert(idx);
        tracing::trace!(hierarchy = hierarchy.name(), %identifier, idx, "inserted node");
        self.nodes.push(StoredNode {
            hierarchy,
            identifier,
            factors: values,
            parents: HashMap::new(),
            children: HashMap::new(),
        });
        Ok(NodeId(idx))
    }

    /// Inserts a node without factor values.
    pub fn insert_node(
        &mut self,
        hierarchy: &str,
        identifier: impl Into<Identifier>,
    ) -> MemStoreResult<NodeId> {
        self.insert(hierarchy, identifier, std::iter::empty::<(String, Value)>())
    }

    /// Links a child to one of its parents.
    ///
    /// Linking the same pair twice is a no-op.
    pub fn link(&mut self, child: NodeId, parent: NodeId) -> MemStoreResult<()> {
        let child_node = self.stored(child)?;
        let parent_node = self.stored(parent)?;
        let child_type = child_node.hierarchy.clone();
        let parent_type = parent_node.hierarchy.name().to_string();

        let relation = child_type
            .parents()
            .iter()
            .find(|r| r.hierarchy == parent_type)
            .ok_or_else(|| MemStoreError::UndeclaredParent {
                child: child_type.name().to_string(),
                parent: parent_type.clone(),
            })?;

        let existing = child_node.parents.get(&parent_type);
        if existing.is_some_and(|set| set.contains(parent.0)) {
            return Ok(());
        }
        if relation.multiplicity == Multiplicity::One && existing.is_some_and(|set| !set.is_empty())
        {
            return Err(MemStoreError::ParentAlreadySet {
                child: child_type.name().to_string(),
                identifier: child_node.identifier.clone(),
                parent: parent_type,
            });
        }

        self.nodes[child.0 as usize]
            .parents
            .entry(parent_type)
            .or_default()
            .insert(parent.0);
        self.nodes[parent.0 as usize]
            .children
            .entry(child_type.name().to_string())
            .or_default()
            .insert(child.0);
        self.link_count += 1;
        Ok(())
    }

    /// Looks up a node by type and identifier.
    pub fn find(&self, hierarchy: &str, identifier: &Identifier) -> Option<NodeId> {
        self.registry.get_index(hierarchy, identifier).map(NodeId)
    }

    /// The node as a query record.
    pub fn record(&self, node: NodeId) -> MemStoreResult<NodeRecord> {
        self.record_at(node.0)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the store holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Content and execution statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            node_count: self.nodes.len(),
            link_count: self.link_count,
            nodes_by_type: self
                .by_type
                .iter()
                .map(|(h, set)| (h.clone(), set.len()))
                .collect(),
            statements_run: self.counters.statements(),
            rows_returned: self.counters.rows(),
        }
    }

    fn stored(&self, node: NodeId) -> MemStoreResult<&StoredNode> {
        self.nodes
            .get(node.0 as usize)
            .ok_or(MemStoreError::UnknownNode(node.0))
    }

    /// Record of a node; the identifier attribute is included as a property.
    pub(crate) fn record_at(&self, idx: u32) -> MemStoreResult<NodeRecord> {
        let node = self
            .nodes
            .get(idx as usize)
            .ok_or(MemStoreError::UnknownNode(idx))?;
        let mut properties = node.factors.clone();
        properties.insert(
            node.hierarchy.idname().to_string(),
            node.identifier.clone().into(),
        );
        Ok(NodeRecord {
            hierarchy: node.hierarchy.name().to_string(),
            identifier: node.identifier.clone(),
            properties,
        })
    }

    /// All instances of a type, in insertion order.
    pub(crate) fn instances(&self, hierarchy: &str) -> MemStoreResult<&RoaringBitmap> {
        self.by_type
            .get(hierarchy)
            .ok_or_else(|| MemStoreError::UnknownHierarchy(hierarchy.to_string()))
    }

    pub(crate) fn parents_of(&self, idx: u32, hierarchy: &str) -> Option<&RoaringBitmap> {
        self.nodes.get(idx as usize)?.parents.get(hierarchy)
    }

    pub(crate) fn children_of(&self, idx: u32, hierarchy: &str) -> Option<&RoaringBitmap> {
        self.nodes.get(idx as usize)?.children.get(hierarchy)
    }

    /// A property of a node; the identifier attribute reads the identifier.
    ///
    /// Factors the node has no value for read as `Null`.
    pub(crate) fn property(&self, idx: u32, name: &str) -> MemStoreResult<Value> {
        let node = self
            .nodes
            .get(idx as usize)
            .ok_or(MemStoreError::UnknownNode(idx))?;
        if name == node.hierarchy.idname() {
            return Ok(node.identifier.clone().into());
        }
        Ok(node.factors.get(name).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::builder()
            .hierarchy(HierarchyType::builder("Survey").idname("surveyid"))
            .hierarchy(HierarchyType::builder("OB").idname("obid"))
            .hierarchy(
                HierarchyType::builder("Run")
                    .idname("runid")
                    .factor("camera")
                    .parent("OB")
                    .multiple_parent("Survey"),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_insert_validates_type_and_factors() {
        let mut store = MemoryStore::new(schema());
        assert!(matches!(
            store.insert_node("Exposure", 1),
            Err(MemStoreError::UnknownHierarchy(_))
        ));
        assert!(matches!(
            store.insert("Run", 1, [("mjd", 1.5)]),
            Err(MemStoreError::UnknownFactor { .. })
        ));
        assert!(matches!(
            store.insert("Run", 1, [("runid", 2)]),
            Err(MemStoreError::IdentifierFactor { .. })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let mut store = MemoryStore::new(schema());
        store.insert_node("Run", 1).unwrap();
        assert!(store.insert_node("OB", 1).is_ok());
        assert_eq!(
            store.insert_node("Run", 1),
            Err(MemStoreError::DuplicateIdentifier {
                hierarchy: "Run".to_string(),
                identifier: Identifier::Int(1),
            })
        );
    }

    #[test]
    fn test_link_follows_declared_multiplicity() {
        let mut store = MemoryStore::new(schema());
        let run = store.insert_node("Run", 1).unwrap();
        let ob1 = store.insert_node("OB", 1).unwrap();
        let ob2 = store.insert_node("OB", 2).unwrap();
        let s1 = store.insert_node("Survey", "a").unwrap();
        let s2 = store.insert_node("Survey", "b").unwrap();

        store.link(run, ob1).unwrap();
        store.link(run, ob1).unwrap();
        assert!(matches!(
            store.link(run, ob2),
            Err(MemStoreError::ParentAlreadySet { .. })
        ));
        store.link(run, s1).unwrap();
        store.link(run, s2).unwrap();
        assert!(matches!(
            store.link(ob1, run),
            Err(MemStoreError::UndeclaredParent { .. })
        ));

        assert_eq!(store.stats().link_count, 3);
        assert_eq!(store.parents_of(run.index(), "Survey").map(|s| s.len()), Some(2));
        assert_eq!(store.children_of(ob1.index(), "Run").map(|s| s.len()), Some(1));
    }

    #[test]
    fn test_property_reads_identifier_and_defaults_to_null() {
        let mut store = MemoryStore::new(schema());
        let run = store.insert("Run", 7, [("camera", "red")]).unwrap();
        let other = store.insert_node("Run", 8).unwrap();
        assert_eq!(store.property(run.index(), "runid").unwrap(), Value::Int(7));
        assert_eq!(
            store.property(run.index(), "camera").unwrap(),
            Value::Str("red".to_string())
        );
        assert_eq!(store.property(other.index(), "camera").unwrap(), Value::Null);
    }

    #[test]
    fn test_find_and_record() {
        let mut store = MemoryStore::new(schema());
        let run = store.insert("Run", 7, [("camera", "blue")]).unwrap();
        assert_eq!(store.find("Run", &Identifier::Int(7)), Some(run));
        assert_eq!(store.find("OB", &Identifier::Int(7)), None);

        let record = store.record(run).unwrap();
        assert_eq!(record.hierarchy, "Run");
        assert_eq!(record.property("camera"), Some(&Value::from("blue")));
        assert_eq!(record.property("runid"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_stats_count_every_type() {
        let mut store = MemoryStore::new(schema());
        store.insert_node("Run", 1).unwrap();
        store.insert_node("Run", 2).unwrap();
        let stats = store.stats();
        assert_eq!(stats.node_count, 2);
        assert_eq!(stats.nodes_by_type.get("Run"), Some(&2));
        assert_eq!(stats.nodes_by_type.get("OB"), Some(&0));
    }
}
