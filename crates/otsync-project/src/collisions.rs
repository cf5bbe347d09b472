use std::collections::HashSet;

use otsync_collab::UniqueId;

/// Tracks assets whose natural path collides with an already-present file,
/// or whose ancestor is itself collided (§4.1's `_checkCollision`, §8 S8).
#[derive(Default, Debug)]
pub struct Collisions {
    ids: HashSet<UniqueId>,
}

impl Collisions {
    #[must_use]
    pub fn contains(&self, unique_id: UniqueId) -> bool {
        self.ids.contains(&unique_id)
    }

    pub fn mark(&mut self, unique_id: UniqueId) {
        self.ids.insert(unique_id);
    }

    pub fn unmark(&mut self, unique_id: UniqueId) {
        self.ids.remove(&unique_id);
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = UniqueId> + '_ {
        self.ids.iter().copied()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// True if any of `ancestors` is already collided — an ancestor
    /// collision short-circuits the path-against-`files` check entirely
    /// (§8 S8: propagation, not an independent check).
    #[must_use]
    pub fn any_ancestor_collided(&self, ancestors: &[UniqueId]) -> bool {
        ancestors.iter().any(|id| self.contains(*id))
    }
}
