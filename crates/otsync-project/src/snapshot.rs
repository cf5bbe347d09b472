use std::collections::HashMap;
use std::sync::Arc;

use otsync_collab::Asset;
use otsync_collab::ItemId;
use otsync_collab::UniqueId;

/// Immutable, cheaply-cloned point-in-time view of [`crate::VirtualProject`]'s
/// model, mirroring the teacher's `VfsSnapshot` pattern: a consistent read
/// model separate from the live mutable store, so a caller (notably
/// `otsync-mirror`'s reconciliation pass) never needs to hold the
/// project's internal lock across an `await`.
#[derive(Clone)]
pub struct ProjectSnapshot {
    inner: Arc<SnapshotInner>,
}

struct SnapshotInner {
    /// path -> (`unique_id`, is_folder)
    files: HashMap<String, (UniqueId, bool)>,
    assets: HashMap<UniqueId, Asset>,
    collisions: HashMap<String, ItemId>,
}

impl ProjectSnapshot {
    pub(crate) fn new(
        files: HashMap<String, (UniqueId, bool)>,
        assets: HashMap<UniqueId, Asset>,
        collisions: HashMap<String, ItemId>,
    ) -> Self {
        Self { inner: Arc::new(SnapshotInner { files, assets, collisions }) }
    }

    /// Every virtual path currently present, sorted depth-ascending then
    /// lexicographically — the order `DiskMirror`'s reconciliation pass
    /// walks them in (§4.2).
    #[must_use]
    pub fn paths_depth_first(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.inner.files.keys().cloned().collect();
        paths.sort_by(|a, b| {
            let depth_a = a.matches('/').count();
            let depth_b = b.matches('/').count();
            depth_a.cmp(&depth_b).then_with(|| a.cmp(b))
        });
        paths
    }

    #[must_use]
    pub fn is_folder(&self, path: &str) -> Option<bool> {
        self.inner.files.get(path).map(|(_, is_folder)| *is_folder)
    }

    #[must_use]
    pub fn unique_id_of(&self, path: &str) -> Option<UniqueId> {
        self.inner.files.get(path).map(|(id, _)| *id)
    }

    #[must_use]
    pub fn asset(&self, unique_id: UniqueId) -> Option<&Asset> {
        self.inner.assets.get(&unique_id)
    }

    #[must_use]
    pub fn contains_path(&self, path: &str) -> bool {
        self.inner.files.contains_key(path)
    }

    #[must_use]
    pub fn collisions(&self) -> Vec<(String, ItemId)> {
        self.inner.collisions.iter().map(|(path, item_id)| (path.clone(), *item_id)).collect()
    }

    #[must_use]
    pub fn file_count(&self) -> usize {
        self.inner.files.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_sort_depth_first_then_lexicographically() {
        let mut files = HashMap::new();
        files.insert("b".to_string(), (UniqueId::new(1), true));
        files.insert("a/z.js".to_string(), (UniqueId::new(2), false));
        files.insert("a".to_string(), (UniqueId::new(3), true));
        let snapshot = ProjectSnapshot::new(files, HashMap::new(), HashMap::new());
        assert_eq!(snapshot.paths_depth_first(), vec!["a", "b", "a/z.js"]);
    }
}
