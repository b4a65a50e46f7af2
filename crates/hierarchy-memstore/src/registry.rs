//! Node registry mapping (type, identifier) keys to compact indices.

use std::collections::HashMap;

use hierarchy_schema::Identifier;

/// Registry that maps between typed identifiers and compact `u32` indices.
///
/// Identifiers are only unique within a hierarchy type and may be strings,
/// while roaring bitmaps need dense `u32` indices. Indices are assigned
/// sequentially, so ascending index order is insertion order.
///
/// # Example
///
/// ```
/// use hierarchy_memstore::NodeRegistry;
/// use hierarchy_schema::Identifier;
///
/// let mut registry = NodeRegistry::new();
/// let idx = registry.register("Run", Identifier::Int(1002));
/// assert_eq!(registry.get_index("Run", &Identifier::Int(1002)), Some(idx));
/// assert_eq!(registry.get_index("OB", &Identifier::Int(1002)), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    /// (type, identifier) -> index.
    key_to_index: HashMap<(String, Identifier), u32>,
    /// index -> (type, identifier).
    index_to_key: Vec<(String, Identifier)>,
}

impl NodeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a key and returns its index.
    ///
    /// If the key is already registered, returns the existing index.
    pub fn register(&mut self, hierarchy: &str, identifier: Identifier) -> u32 {
        let key = (hierarchy.to_string(), identifier);
        if let Some(&idx) = self.key_to_index.get(&key) {
            return idx;
        }
        let idx = self.index_to_key.len() as u32;
        self.key_to_index.insert(key.clone(), idx);
        self.index_to_key.push(key);
        idx
    }

    /// Index of a key, if registered.
    #[inline]
    pub fn get_index(&self, hierarchy: &str, identifier: &Identifier) -> Option<u32> {
        self.key_to_index
            .get(&(hierarchy.to_string(), identifier.clone()))
            .copied()
    }

    /// Key of an index, if in bounds.
    #[inline]
    pub fn get_key(&self, index: u32) -> Option<(&str, &Identifier)> {
        self.index_to_key
            .get(index as usize)
            .map(|(h, id)| (h.as_str(), id))
    }

    /// Number of registered nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.index_to_key.len()
    }

    /// Returns true if nothing is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index_to_key.is_empty()
    }

    /// Returns true if the key is registered.
    #[inline]
    pub fn contains(&self, hierarchy: &str, identifier: &Identifier) -> bool {
        self.get_index(hierarchy, identifier).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = NodeRegistry::new();
        let a = registry.register("Run", Identifier::Int(1));
        let b = registry.register("Run", Identifier::Int(1));
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_identifiers_are_scoped_by_type() {
        let mut registry = NodeRegistry::new();
        let run = registry.register("Run", Identifier::Int(1));
        let ob = registry.register("OB", Identifier::Int(1));
        assert_ne!(run, ob);
        assert_eq!(registry.get_key(ob), Some(("OB", &Identifier::Int(1))));
        assert!(registry.get_key(2).is_none());
        assert!(registry.contains("Run", &Identifier::Int(1)));
        assert!(!registry.contains("Run", &Identifier::Str("1".to_string())));
    }
}
