//! Interning of external identifiers into dense indices.

use fnv::FnvHashMap;

/// Insertion-ordered mapping from opaque external ids to dense indices.
///
/// Indices are contiguous in `[0, len)` and assigned in first-seen order.
/// Looking up an id that was never added returns `None`; the prediction
/// fallbacks rely on that rather than on an error. The map is append-only
/// while a training set is built and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    index_of: FnvHashMap<u64, usize>,
    ids: Vec<u64>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index_of: FnvHashMap::with_capacity_and_hasher(capacity, Default::default()),
            ids: Vec::with_capacity(capacity),
        }
    }

    /// Rebuild a map from external ids in insertion order.
    pub fn from_ids(ids: Vec<u64>) -> Self {
        let mut map = Self::with_capacity(ids.len());
        for id in ids {
            map.add(id);
        }
        map
    }

    /// Intern `external`, assigning the next dense index on first sight.
    /// Repeated calls with the same id return the same index.
    pub fn add(&mut self, external: u64) -> usize {
        match self.index_of.get(&external) {
            Some(&index) => index,
            None => {
                let index = self.ids.len();
                self.index_of.insert(external, index);
                self.ids.push(external);
                index
            }
        }
    }

    /// Dense index of `external`, or `None` if it was never added.
    pub fn to_index(&self, external: u64) -> Option<usize> {
        self.index_of.get(&external).copied()
    }

    /// All external ids in insertion order.
    pub fn external_ids(&self) -> &[u64] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_assigns_indices_in_first_seen_order() {
        let mut map = IdMap::new();
        assert_eq!(map.add(42), 0);
        assert_eq!(map.add(7), 1);
        assert_eq!(map.add(1000), 2);
        assert_eq!(map.external_ids(), &[42, 7, 1000]);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut map = IdMap::new();
        assert_eq!(map.add(5), 0);
        assert_eq!(map.add(9), 1);
        assert_eq!(map.add(5), 0);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_to_index_returns_none_for_unseen() {
        let mut map = IdMap::new();
        map.add(3);
        assert_eq!(map.to_index(3), Some(0));
        assert_eq!(map.to_index(4), None);
    }

    #[test]
    fn test_from_ids_round_trips_insertion_order() {
        let mut map = IdMap::new();
        for id in [11, 3, 27, 5] {
            map.add(id);
        }
        let rebuilt = IdMap::from_ids(map.external_ids().to_vec());
        assert_eq!(rebuilt.external_ids(), map.external_ids());
        assert_eq!(rebuilt.to_index(27), Some(2));
    }

    #[test]
    fn test_empty_map() {
        let map = IdMap::new();
        assert!(map.is_empty());
        assert_eq!(map.to_index(0), None);
    }
}
