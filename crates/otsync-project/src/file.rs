use std::sync::Arc;

use otsync_collab::DocHandle;
use otsync_collab::UniqueId;

/// In-memory node backing one entry in [`crate::VirtualProject`]'s `files`
/// map (§3). Files carry an `Arc` doc handle rather than an owned `Box`
/// because the same handle is also held by the per-document op-watcher
/// task spawned when the file is installed.
pub enum VirtualFile {
    Folder {
        unique_id: UniqueId,
    },
    File {
        unique_id: UniqueId,
        doc: Arc<dyn DocHandle>,
        /// `true` when the Doc's content hash differs from the asset's
        /// last-persisted storage hash (§3, invariant 5).
        dirty: bool,
    },
}

impl VirtualFile {
    #[must_use]
    pub fn unique_id(&self) -> UniqueId {
        match self {
            Self::Folder { unique_id } | Self::File { unique_id, .. } => *unique_id,
        }
    }

    #[must_use]
    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder { .. })
    }

    #[must_use]
    pub fn as_file(&self) -> Option<(&Arc<dyn DocHandle>, bool)> {
        match self {
            Self::File { doc, dirty, .. } => Some((doc, *dirty)),
            Self::Folder { .. } => None,
        }
    }

    #[must_use]
    pub fn doc(&self) -> Option<Arc<dyn DocHandle>> {
        match self {
            Self::File { doc, .. } => Some(Arc::clone(doc)),
            Self::Folder { .. } => None,
        }
    }

    pub fn set_dirty(&mut self, value: bool) {
        if let Self::File { dirty, .. } = self {
            *dirty = value;
        }
    }
}
