//! Traversal paths and plurality proofs.
//!
//! A hop between two hierarchy types is singular when every edge on the
//! chosen path is singular: child to declared-one parent. Any step from a
//! parent down to its children, or to a `Multiple` parent, is plural.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use crate::error::{SchemaError, SchemaResult};

/// Direction of a single hop along a parent relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// From a child to one of its declared parents.
    ToParent,
    /// From a parent to the children declaring it.
    ToChild,
}

/// One edge of a [`TraversalPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hop {
    /// Type the hop starts from.
    pub from: String,
    /// Type the hop arrives at.
    pub to: String,
    /// Edge direction.
    pub direction: Direction,
    /// Whether this edge can yield more than one instance.
    pub plural: bool,
}

/// A schema-level route between two hierarchy types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TraversalPath {
    /// Start type.
    pub start: String,
    /// End type.
    pub end: String,
    /// Ordered hops; empty for the identity path.
    pub hops: Vec<Hop>,
}

impl TraversalPath {
    /// The zero-hop path from a type to itself.
    pub fn identity(hierarchy: impl Into<String>) -> Self {
        let hierarchy = hierarchy.into();
        Self {
            start: hierarchy.clone(),
            end: hierarchy,
            hops: Vec::new(),
        }
    }

    /// Returns true for the zero-hop path.
    pub fn is_identity(&self) -> bool {
        self.hops.is_empty()
    }

    /// Returns true if any hop is plural.
    pub fn is_plural(&self) -> bool {
        self.hops.iter().any(|h| h.plural)
    }
}

impl fmt::Display for TraversalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.start)?;
        for hop in &self.hops {
            let arrow = match (hop.direction, hop.plural) {
                (Direction::ToParent, false) => "->",
                (Direction::ToParent, true) => "=>",
                (Direction::ToChild, _) => "<=",
            };
            write!(f, "{}({})", arrow, hop.to)?;
        }
        Ok(())
    }
}

/// The result of asking whether a hop between two types is plural.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluralityProof {
    /// Whether the hop can yield more than one instance.
    pub plural: bool,
    /// The traversal route that was proven.
    pub path: TraversalPath,
    /// The type reached.
    pub target: String,
}

impl PluralityProof {
    /// Proof for a type referring to itself.
    pub fn identity(hierarchy: impl Into<String>) -> Self {
        let hierarchy = hierarchy.into();
        Self {
            plural: false,
            path: TraversalPath::identity(hierarchy.clone()),
            target: hierarchy,
        }
    }

    /// Number of hops on the proven path.
    pub fn hop_count(&self) -> usize {
        self.path.hops.len()
    }

    /// Expected instance count: `Some(1)` for definite hops, `None` when plural.
    pub fn expected_count(&self) -> Option<usize> {
        if self.plural {
            None
        } else {
            Some(1)
        }
    }

    /// Returns true for a self-referential proof.
    pub fn is_identity(&self) -> bool {
        self.path.is_identity()
    }
}

/// Adjacency list of the relation graph, keyed by type name.
#[derive(Debug, Clone, Default)]
pub(crate) struct RelationGraph {
    edges: HashMap<String, Vec<Hop>>,
}

impl RelationGraph {
    pub(crate) fn add_parent(&mut self, child: &str, parent: &str, multiple: bool) {
        self.edges.entry(child.to_string()).or_default().push(Hop {
            from: child.to_string(),
            to: parent.to_string(),
            direction: Direction::ToParent,
            plural: multiple,
        });
        self.edges.entry(parent.to_string()).or_default().push(Hop {
            from: parent.to_string(),
            to: child.to_string(),
            direction: Direction::ToChild,
            plural: true,
        });
    }

    /// Proves the plurality of the hop from `start` to `end`.
    ///
    /// A route using only singular edges wins over any shorter plural route.
    pub(crate) fn prove(&self, start: &str, end: &str) -> SchemaResult<PluralityProof> {
        if start == end {
            return Ok(PluralityProof::identity(start));
        }
        if let Some(hops) = self.shortest(start, end, true) {
            return Ok(self.proof(start, end, hops));
        }
        match self.shortest(start, end, false) {
            Some(hops) => Ok(self.proof(start, end, hops)),
            None => Err(SchemaError::NoPath {
                from: start.to_string(),
                to: end.to_string(),
            }),
        }
    }

    fn proof(&self, start: &str, end: &str, hops: Vec<Hop>) -> PluralityProof {
        let path = TraversalPath {
            start: start.to_string(),
            end: end.to_string(),
            hops,
        };
        PluralityProof {
            plural: path.is_plural(),
            path,
            target: end.to_string(),
        }
    }

    /// BFS over the relation graph, optionally restricted to singular edges.
    fn shortest(&self, start: &str, end: &str, singular_only: bool) -> Option<Vec<Hop>> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut came_from: HashMap<&str, &Hop> = HashMap::new();
        let mut queue = VecDeque::new();

        visited.insert(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            if current == end {
                break;
            }
            let Some(edges) = self.edges.get(current) else {
                continue;
            };
            for hop in edges {
                if singular_only && hop.plural {
                    continue;
                }
                if visited.insert(hop.to.as_str()) {
                    came_from.insert(hop.to.as_str(), hop);
                    queue.push_back(hop.to.as_str());
                }
            }
        }

        if !visited.contains(end) {
            return None;
        }

        let mut hops = Vec::new();
        let mut cursor = end;
        while cursor != start {
            let hop = came_from.get(cursor)?;
            hops.push((*hop).clone());
            cursor = hop.from.as_str();
        }
        hops.reverse();
        Some(hops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ```text
    /// Survey  <=(multiple)  OBSpec  <-  OB  <-  Exposure  <-  Run
    /// ```
    fn graph() -> RelationGraph {
        let mut graph = RelationGraph::default();
        graph.add_parent("OBSpec", "Survey", true);
        graph.add_parent("OB", "OBSpec", false);
        graph.add_parent("Exposure", "OB", false);
        graph.add_parent("Run", "Exposure", false);
        graph
    }

    #[test]
    fn test_identity_proof() {
        let proof = graph().prove("OB", "OB").unwrap();
        assert!(!proof.plural);
        assert!(proof.is_identity());
        assert_eq!(proof.expected_count(), Some(1));
    }

    #[test]
    fn test_child_to_parent_is_singular() {
        let proof = graph().prove("Run", "OB").unwrap();
        assert!(!proof.plural);
        assert_eq!(proof.hop_count(), 2);
        assert_eq!(proof.path.to_string(), "(Run)->(Exposure)->(OB)");
    }

    #[test]
    fn test_parent_to_child_is_plural() {
        let proof = graph().prove("OB", "Run").unwrap();
        assert!(proof.plural);
        assert_eq!(proof.expected_count(), None);
        assert_eq!(proof.path.to_string(), "(OB)<=(Exposure)<=(Run)");
    }

    #[test]
    fn test_multiple_parent_is_plural() {
        let proof = graph().prove("Run", "Survey").unwrap();
        assert!(proof.plural);
        assert_eq!(proof.hop_count(), 4);
        assert!(proof.path.hops.last().unwrap().plural);
    }

    #[test]
    fn test_singular_route_preferred_over_shorter_plural_route() {
        // A -> B -> C is singular; A <= C directly is plural.
        let mut graph = RelationGraph::default();
        graph.add_parent("A", "B", false);
        graph.add_parent("B", "C", false);
        graph.add_parent("C", "A", false);
        let proof = graph.prove("A", "C").unwrap();
        assert!(!proof.plural);
        assert_eq!(proof.hop_count(), 2);
    }

    #[test]
    fn test_disconnected_types() {
        let mut graph = graph();
        graph.add_parent("FibreTarget", "Fibre", false);
        let err = graph.prove("Run", "Fibre").unwrap_err();
        assert!(matches!(err, SchemaError::NoPath { .. }));
    }
}
