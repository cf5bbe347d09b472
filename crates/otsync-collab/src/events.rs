use camino::Utf8PathBuf;

use crate::ids::ItemId;
use crate::ids::UniqueId;
use crate::AssetKind;

/// A realtime collection name. The core only ever subscribes to these two.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Collection {
    Assets,
    Documents,
}

impl Collection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assets => "assets",
            Self::Documents => "documents",
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum DocSaveState {
    Success,
    Error,
}

#[derive(Clone, Debug)]
pub struct DocSaveEvent {
    pub unique_id: UniqueId,
    pub state: DocSaveState,
}

/// Events the messenger delivers out-of-band from the realtime document
/// collections: a brand-new asset, or a batch of deletions.
#[derive(Clone, Debug)]
pub enum MessengerEvent {
    AssetNew {
        unique_id: UniqueId,
        item_id: ItemId,
        name: String,
        kind: AssetKind,
        branch_id: String,
    },
    AssetsDelete {
        unique_ids: Vec<UniqueId>,
    },
}

/// A filesystem change as reported by the editor host's watcher. The host
/// never reports renames directly — `DiskMirror`'s coalescer infers a
/// rename from a correlated delete+create pair (§4.2).
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum FsEvent {
    Created(Utf8PathBuf),
    Changed(Utf8PathBuf),
    Deleted(Utf8PathBuf),
}

impl FsEvent {
    #[must_use]
    pub fn path(&self) -> &Utf8PathBuf {
        match self {
            Self::Created(p) | Self::Changed(p) | Self::Deleted(p) => p,
        }
    }
}

/// Minimal `stat` result: whether a path exists and if so, what kind of
/// entry it is.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum FileStat {
    File,
    Directory,
}

/// One content-replacing change within an editor's open-document change
/// event, as the host reports it (pre-batch offsets into the document as it
/// stood before the batch, matching `OpCodec.editorChangesToOps`'s
/// contract).
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct RawTextChange {
    pub range_offset: usize,
    pub range_length: usize,
    pub text: String,
}

impl RawTextChange {
    #[must_use]
    pub fn new(range_offset: usize, range_length: usize, text: impl Into<String>) -> Self {
        Self { range_offset, range_length, text: text.into() }
    }
}

/// An event on one of the editor's currently-open text documents, as
/// distinct from [`FsEvent`]: these come from the editor's in-memory buffer
/// (`onDidChangeTextDocument`/`onWillSaveTextDocument`-shaped), not from the
/// filesystem watcher, and never pass through the echo set or coalescer.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum DocumentEvent {
    Changed { path: Utf8PathBuf, changes: Vec<RawTextChange> },
    SaveRequested { path: Utf8PathBuf },
}

impl DocumentEvent {
    #[must_use]
    pub fn path(&self) -> &Utf8PathBuf {
        match self {
            Self::Changed { path, .. } | Self::SaveRequested { path } => path,
        }
    }
}
