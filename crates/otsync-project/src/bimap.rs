use std::collections::HashMap;

use otsync_collab::ItemId;
use otsync_collab::UniqueId;

/// Bidirectional `itemId <-> uniqueId` map (§3, invariant 2). Each
/// direction's keys are unique by construction: inserting a pair evicts
/// any stale mapping either id previously held, so the two maps can never
/// drift out of sync with each other.
#[derive(Default, Debug)]
pub struct IdBimap {
    item_to_unique: HashMap<ItemId, UniqueId>,
    unique_to_item: HashMap<UniqueId, ItemId>,
}

impl IdBimap {
    pub fn insert(&mut self, item_id: ItemId, unique_id: UniqueId) {
        if let Some(stale_unique) = self.item_to_unique.insert(item_id, unique_id) {
            self.unique_to_item.remove(&stale_unique);
        }
        if let Some(stale_item) = self.unique_to_item.insert(unique_id, item_id) {
            self.item_to_unique.remove(&stale_item);
        }
        // Re-insert in case the two removals above clobbered the pair we
        // just inserted (can happen when an id is reassigned to a
        // different partner in the same call).
        self.item_to_unique.insert(item_id, unique_id);
        self.unique_to_item.insert(unique_id, item_id);
    }

    pub fn remove_by_unique(&mut self, unique_id: UniqueId) {
        if let Some(item_id) = self.unique_to_item.remove(&unique_id) {
            self.item_to_unique.remove(&item_id);
        }
    }

    #[must_use]
    pub fn unique_for(&self, item_id: ItemId) -> Option<UniqueId> {
        self.item_to_unique.get(&item_id).copied()
    }

    #[must_use]
    pub fn item_for(&self, unique_id: UniqueId) -> Option<ItemId> {
        self.unique_to_item.get(&unique_id).copied()
    }

    pub fn clear(&mut self) {
        self.item_to_unique.clear();
        self.unique_to_item.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_both_directions() {
        let mut bimap = IdBimap::default();
        bimap.insert(ItemId::new(1), UniqueId::new(100));
        assert_eq!(bimap.unique_for(ItemId::new(1)), Some(UniqueId::new(100)));
        assert_eq!(bimap.item_for(UniqueId::new(100)), Some(ItemId::new(1)));
    }

    #[test]
    fn reinserting_an_item_id_evicts_the_old_unique_mapping() {
        let mut bimap = IdBimap::default();
        bimap.insert(ItemId::new(1), UniqueId::new(100));
        bimap.insert(ItemId::new(1), UniqueId::new(200));
        assert_eq!(bimap.unique_for(ItemId::new(1)), Some(UniqueId::new(200)));
        assert_eq!(bimap.item_for(UniqueId::new(100)), None);
        assert_eq!(bimap.item_for(UniqueId::new(200)), Some(ItemId::new(1)));
    }

    #[test]
    fn remove_by_unique_clears_both_directions() {
        let mut bimap = IdBimap::default();
        bimap.insert(ItemId::new(1), UniqueId::new(100));
        bimap.remove_by_unique(UniqueId::new(100));
        assert_eq!(bimap.unique_for(ItemId::new(1)), None);
        assert_eq!(bimap.item_for(UniqueId::new(100)), None);
    }
}
