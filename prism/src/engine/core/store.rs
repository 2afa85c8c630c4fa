use crate::core::EntityId;
use itertools::Itertools;
use smallvec::SmallVec;

/// Ordered, uniquely-keyed collection of child entities under one owner.
///
/// Insertion order is preserved; entries can be looked up by key or by index.
/// The store only holds ids, never strong references, so destroying an owner
/// can walk its entries without touching reference counts.
#[derive(Debug, Default, Clone)]
pub struct Store {
    entries: SmallVec<[(String, EntityId); 4]>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.iter().any(|(_, e)| *e == id)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Appends an entry. Fails when the key is already taken.
    pub fn add(&mut self, key: impl Into<String>, id: EntityId) -> bool {
        let key = key.into();
        if self.contains_key(&key) {
            return false;
        }
        self.entries.push((key, id));
        true
    }

    /// Removes the entry holding `id`, preserving the order of the rest.
    pub fn remove(&mut self, id: EntityId) -> bool {
        let pos_opt = self
            .entries
            .iter()
            .find_position(|(_, e)| *e == id)
            .map(|(pos, _)| pos);
        match pos_opt {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn by_key(&self, key: &str) -> Option<EntityId> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, id)| *id)
    }

    pub fn by_index(&self, index: usize) -> Option<EntityId> {
        self.entries.get(index).map(|(_, id)| *id)
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entries.iter().map(|(_, id)| *id)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn ids(n: usize) -> Vec<EntityId> {
        let mut map: SlotMap<EntityId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn preserves_insertion_order() {
        let ids = ids(3);
        let mut store = Store::new();
        assert!(store.add("a", ids[0]));
        assert!(store.add("b", ids[1]));
        assert!(store.add("c", ids[2]));

        let collected: Vec<_> = store.ids().collect();
        assert_eq!(collected, ids);
        assert_eq!(store.by_index(1), Some(ids[1]));
        assert_eq!(store.by_key("c"), Some(ids[2]));
    }

    #[test]
    fn rejects_duplicate_keys() {
        let ids = ids(2);
        let mut store = Store::new();
        assert!(store.add("a", ids[0]));
        assert!(!store.add("a", ids[1]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_keeps_order() {
        let ids = ids(3);
        let mut store = Store::new();
        store.add("a", ids[0]);
        store.add("b", ids[1]);
        store.add("c", ids[2]);

        assert!(store.remove(ids[1]));
        assert!(!store.remove(ids[1]));
        let collected: Vec<_> = store.ids().collect();
        assert_eq!(collected, vec![ids[0], ids[2]]);
    }
}
