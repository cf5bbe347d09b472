use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use tokio_stream::Stream;

use crate::asset::Asset;
use crate::asset::AssetKind;
use crate::events::Collection;
use crate::events::DocSaveEvent;
use crate::events::DocumentEvent;
use crate::events::FileStat;
use crate::events::FsEvent;
use crate::events::MessengerEvent;
use crate::ids::UniqueId;
use crate::otop::OtOp;
use crate::text_edit::TextEdit;
use crate::LOCAL_OT_SOURCE;

/// One event observed on a subscribed [`DocHandle`]: a remote op (tagged
/// with whatever source the origin submitted under, so the receiver can
/// tell a local echo from a genuine remote edit), or the document being
/// deleted out from under the subscription.
///
/// The op travels as a raw JSON value, the way ShareDB actually puts it on
/// the wire — `documents` collection ops are [`OtOp`]'s array shapes,
/// `assets` collection ops are json0 object components
/// (`otsync_project::asset_op::AssetOpComponent`'s wire shape). Which one a
/// given doc produces is a property of its collection, not of this type;
/// the consumer picks the right parser for the collection it subscribed
/// to.
#[derive(Clone, Debug)]
pub enum DocEvent {
    Op { op: serde_json::Value, source: Option<String> },
    Deleted,
}

pub type DocEventStream = Pin<Box<dyn Stream<Item = DocEvent> + Send>>;

/// A single live ShareDB-style document handle: a JSON snapshot plus an op
/// stream, and a way to submit new ops under a caller-chosen source tag
/// (§4.2's echo-suppression scheme hinges on every local submission using
/// [`LOCAL_OT_SOURCE`]).
#[async_trait]
pub trait DocHandle: Send + Sync {
    fn unique_id(&self) -> UniqueId;

    /// The document's current JSON snapshot. For the `documents` collection
    /// this is `{"data": "<file contents>"}`; for `assets` it is the
    /// serialized [`Asset`].
    fn snapshot(&self) -> serde_json::Value;

    /// Subscribe to future ops and deletions on this document.
    fn events(&self) -> DocEventStream;

    async fn submit_op(&self, op: serde_json::Value, source: &str) -> anyhow::Result<()>;

    /// Convenience for the common case of submitting a text op under the
    /// sync core's own local source tag (only meaningful against
    /// `documents` collection docs).
    async fn submit_local_op(&self, op: OtOp) -> anyhow::Result<()> {
        self.submit_op(op.to_json(), LOCAL_OT_SOURCE).await
    }
}

/// Lets an `Arc<FakeDocHandle>` (or any other shared handle) be handed out
/// as a `Box<dyn DocHandle>` while a test keeps its own `Arc` to drive
/// remote events after the fact.
#[async_trait]
impl<T> DocHandle for Arc<T>
where
    T: DocHandle + ?Sized,
{
    fn unique_id(&self) -> UniqueId {
        (**self).unique_id()
    }

    fn snapshot(&self) -> serde_json::Value {
        (**self).snapshot()
    }

    fn events(&self) -> DocEventStream {
        (**self).events()
    }

    async fn submit_op(&self, op: serde_json::Value, source: &str) -> anyhow::Result<()> {
        (**self).submit_op(op, source).await
    }
}

/// The realtime collaboration channel: subscribing to a [`Collection`]
/// yields every currently-live document in it plus a feed of newly created
/// ones, each as a [`DocHandle`] (§4.1).
///
/// §6 describes two of this channel's control actions — reparenting an
/// asset and requesting a document save — as raw `sendRaw(payload: string)`
/// messages (`"fs"+JSON{op:"move",...}`, `"doc:save:<id>"`). This contract
/// models both as their own typed methods instead of a stringly-typed
/// control bus: the payload shapes are fixed and few, so a method per
/// action gets the same wire behavior with compile-time checked
/// arguments, matching how `RestClient` below already models `assetCreate`
/// et al. as methods rather than raw request bodies.
#[async_trait]
pub trait RealtimeClient: Send + Sync {
    async fn subscribe(&self, collection: Collection) -> anyhow::Result<Vec<Box<dyn DocHandle>>>;

    async fn get_doc(
        &self,
        collection: Collection,
        unique_id: UniqueId,
    ) -> anyhow::Result<Box<dyn DocHandle>>;

    /// Reparent `unique_id` to `dest_folder` (`None` means the root
    /// folder, the `to:0` case in §4.1's `rename`).
    async fn move_asset(&self, unique_id: UniqueId, dest_folder: Option<UniqueId>) -> anyhow::Result<()>;

    /// Request that the server persist `unique_id`'s current document
    /// content to storage (§4.1's `save`, §6's `"doc:save:<uniqueId>"`).
    /// Completion is observed asynchronously via
    /// [`Messenger::doc_saves`].
    async fn request_save(&self, unique_id: UniqueId) -> anyhow::Result<()>;
}

/// Request body for creating a new asset through the REST API.
#[derive(Clone, Debug)]
pub struct AssetCreateRequest {
    pub name: String,
    pub kind: AssetKind,
    pub parent_item_id: Option<crate::ids::ItemId>,
    pub branch_id: String,
    /// Initial file content (`None`/absent for folders). §4.1's `create`
    /// coerces empty content to a single `"\n"` before this request is
    /// built, so an empty string here is always a deliberate single
    /// newline, never "no content yet".
    pub content: Option<String>,
}

/// The stateless request/response half of the server contract: asset CRUD
/// and branch listing, as used by §4.1's `create`/`delete`/`rename`
/// operations.
#[async_trait]
pub trait RestClient: Send + Sync {
    async fn create_asset(&self, request: AssetCreateRequest) -> anyhow::Result<Asset>;
    async fn delete_asset(&self, unique_id: UniqueId) -> anyhow::Result<()>;
    async fn rename_asset(&self, unique_id: UniqueId, new_name: String) -> anyhow::Result<()>;
    async fn list_branches(&self) -> anyhow::Result<Vec<crate::asset::Branch>>;
}

/// Out-of-band push channel used for asset creation/deletion notices and
/// document save acknowledgements that don't fit the realtime op stream
/// (§4.1, §4.3).
#[async_trait]
pub trait Messenger: Send + Sync {
    fn events(&self) -> Pin<Box<dyn Stream<Item = MessengerEvent> + Send>>;
    fn doc_saves(&self) -> Pin<Box<dyn Stream<Item = DocSaveEvent> + Send>>;
}

/// The editor/filesystem side of the bridge: the local workspace root,
/// applying and observing text edits, and raw file operations used to
/// keep the disk mirror in sync (§4.2, §4.3).
#[async_trait]
pub trait EditorHost: Send + Sync {
    fn workspace_root(&self) -> &Utf8Path;

    /// Stream of local filesystem changes under the workspace root, as
    /// reported by the host's own watcher.
    fn watch(&self) -> Pin<Box<dyn Stream<Item = FsEvent> + Send>>;

    async fn stat(&self, path: &Utf8Path) -> anyhow::Result<Option<FileStat>>;
    async fn read_to_string(&self, path: &Utf8Path) -> anyhow::Result<String>;

    /// Direct children of a directory, as workspace-relative paths paired
    /// with their kind. Used by `DiskMirror`'s reconciliation pass to walk
    /// the disk looking for entries absent from the model.
    async fn read_dir(&self, path: &Utf8Path) -> anyhow::Result<Vec<(Utf8PathBuf, FileStat)>>;
    async fn write(&self, path: &Utf8Path, contents: &str) -> anyhow::Result<()>;
    async fn create_dir(&self, path: &Utf8Path) -> anyhow::Result<()>;
    async fn remove_file(&self, path: &Utf8Path) -> anyhow::Result<()>;
    async fn remove_dir(&self, path: &Utf8Path) -> anyhow::Result<()>;
    async fn rename(&self, from: &Utf8Path, to: &Utf8Path) -> anyhow::Result<()>;

    /// Open `path` as a visible editor document (`DiskMirror::link`'s
    /// optional `openPath`). A no-op if it is already open.
    async fn open_document(&self, path: &Utf8Path) -> anyhow::Result<()>;

    /// Apply a batch of editor-facing text edits to an already-open
    /// buffer for `path`, without going through the filesystem (used when
    /// a remote op lands on a file the editor currently has open).
    async fn apply_edits(&self, path: &Utf8Path, edits: Vec<TextEdit>) -> anyhow::Result<()>;

    /// The editor's current in-buffer content for `path`, if it is open;
    /// `None` means the caller should fall back to reading the file off
    /// disk.
    async fn open_buffer_contents(&self, path: &Utf8Path) -> anyhow::Result<Option<String>>;

    /// Stream of edits and save intents on the editor's currently-open
    /// documents — the source for §4.2's "Editor-document watcher",
    /// distinct from [`EditorHost::watch`]'s filesystem-level events.
    fn document_events(&self) -> Pin<Box<dyn Stream<Item = DocumentEvent> + Send>>;
}

/// Sink for user-visible warnings that aren't fatal (§7's "Alert"
/// severity) — surfaced through the editor host's own notification UI.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn alert(&self, message: String);
}

/// Re-exported so downstream crates that only need the path type don't
/// have to add `camino` themselves.
pub type WorkspacePath = Utf8PathBuf;
