use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use otsync_collab::Asset;
use otsync_collab::AssetCreateRequest;
use otsync_collab::AssetKind;
use otsync_collab::AlertSink;
use otsync_collab::Clock;
use otsync_collab::Collection;
use otsync_collab::Config;
use otsync_collab::DocEvent;
use otsync_collab::DocHandle;
use otsync_collab::DocSaveState;
use otsync_collab::ItemId;
use otsync_collab::Messenger;
use otsync_collab::MessengerEvent;
use otsync_collab::OtOp;
use otsync_collab::RealtimeClient;
use otsync_collab::RestClient;
use otsync_collab::UniqueId;
use otsync_collab::LOCAL_OT_SOURCE;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt as _;

use crate::asset_op::AssetOpComponent;
use crate::bimap::IdBimap;
use crate::collisions::Collisions;
use crate::error::ProjectError;
use crate::error::ProjectResult;
use crate::events::AssetField;
use crate::events::ProjectEvent;
use crate::events::EVENT_CHANNEL_CAPACITY;
use crate::file::VirtualFile;
use crate::path::fold_path;
use crate::snapshot::ProjectSnapshot;

/// Reserved `uniqueId` for the always-present root folder `""`, which never
/// arrives over the wire as its own asset.
const ROOT_UNIQUE_ID: UniqueId = UniqueId(0);

/// Whether a `create` call is placing a folder or a text file (§4.1's
/// `create`). A folder has no content and no extension-derived type; a
/// file's [`otsync_collab::AssetKind`] is derived from its name's
/// extension rather than chosen by the caller.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum CreateKind {
    Folder,
    File,
}

/// Extensions the fixed type table (§4.1's `create`) recognizes by name.
/// Anything else gets a forced `.txt` suffix and the `Text` kind.
const KNOWN_EXTENSIONS: &[&str] = &["css", "html", "json", "js", "mjs", "txt", "glsl"];

#[derive(Default)]
struct State {
    linked: Option<LinkedContext>,
    assets: HashMap<UniqueId, Asset>,
    files: HashMap<String, VirtualFile>,
    bimap: IdBimap,
    collisions: Collisions,
    /// path -> (uniqueId, itemId) for every currently collided asset.
    collision_paths: HashMap<String, (UniqueId, ItemId)>,
    /// Raw JSON mirror of each tracked asset doc's snapshot, mutated in
    /// place by incoming json0 ops so `asset_op::apply` always has a full
    /// object to descend (§4.1's "Remote op application").
    asset_json: HashMap<UniqueId, serde_json::Value>,
    metadata_docs: HashMap<UniqueId, Arc<dyn DocHandle>>,
    /// Content docs fetched by `link`'s bulk `documents` subscribe,
    /// claimed (removed) as each file asset is placed. Assets created
    /// after `link` fetch their content doc individually instead.
    bulk_documents: HashMap<UniqueId, Arc<dyn DocHandle>>,
}

struct LinkedContext {
    project_id: String,
    branch_id: String,
    /// Every watcher task spawned while linked, aborted on `unlink` —
    /// the closest idempotent equivalent to §5's "teardown closures" now
    /// that there is no `unsubscribe` half to the collaborator contract.
    tasks: Vec<JoinHandle<()>>,
}

/// In-memory model of a remote OT project (§3, §4.1). Holds the
/// `path -> VirtualFile` map, the asset table, and the `itemId <->
/// uniqueId` bimap behind a plain `std::sync::Mutex`: the spec's
/// single-task scheduling model would normally call for bare interior
/// mutability with no synchronization primitive at all, but the watcher
/// tasks below are spawned with `tokio::spawn`, which requires `Send +
/// 'static` regardless of how many OS threads the runtime actually uses —
/// a `RefCell` does not satisfy that bound. A `Mutex` that is only ever
/// held across synchronous sections (never across an `.await`) costs
/// nothing beyond what `RefCell` would on a genuinely single-threaded
/// runtime and keeps every mutation on the model provably non-reentrant.
pub struct VirtualProject {
    realtime: Arc<dyn RealtimeClient>,
    rest: Arc<dyn RestClient>,
    messenger: Arc<dyn Messenger>,
    alerts: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    config: Config,
    state: Mutex<State>,
    events: broadcast::Sender<ProjectEvent>,
}

enum Placement {
    Collision { path: String, item_id: ItemId },
    Folder { path: String, kind: AssetKind },
    File { path: String, kind: AssetKind },
    PendingFilename,
    AlreadyPlaced,
    NotReady,
}

impl VirtualProject {
    #[must_use]
    pub fn new(
        realtime: Arc<dyn RealtimeClient>,
        rest: Arc<dyn RestClient>,
        messenger: Arc<dyn Messenger>,
        alerts: Arc<dyn AlertSink>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            realtime,
            rest,
            messenger,
            alerts,
            clock,
            config,
            state: Mutex::new(State::default()),
            events,
        })
    }

    /// An immutable, cheaply-cloned read view of the current model
    /// (§4.1's "[ADD] Snapshot access").
    #[must_use]
    pub fn snapshot(&self) -> ProjectSnapshot {
        let state = self.state.lock().expect("state mutex poisoned");
        let files = state.files.iter().map(|(path, file)| (path.clone(), (file.unique_id(), file.is_folder()))).collect();
        let assets = state.assets.clone();
        let collisions = state.collision_paths.iter().map(|(path, (_, item_id))| (path.clone(), *item_id)).collect();
        ProjectSnapshot::new(files, assets, collisions)
    }

    #[must_use]
    pub fn collisions(&self) -> Vec<(String, ItemId)> {
        let state = self.state.lock().expect("state mutex poisoned");
        state.collision_paths.iter().map(|(path, (_, item_id))| (path.clone(), *item_id)).collect()
    }

    #[must_use]
    pub fn path(&self, unique_id: UniqueId) -> Option<String> {
        let state = self.state.lock().expect("state mutex poisoned");
        state.files.iter().find(|(_, file)| file.unique_id() == unique_id).map(|(path, _)| path.clone())
    }

    /// The tracked Doc's current content for a file path (`None` for a
    /// folder, a missing path, or a malformed snapshot). `DiskMirror` uses
    /// this to seed disk writes for assets it has no other way to read —
    /// the reconciliation pass and remote `AssetCreate` handling — since
    /// `Doc` handles themselves stay private to this crate.
    #[must_use]
    pub fn content(&self, path: &str) -> Option<String> {
        let state = self.state.lock().expect("state mutex poisoned");
        let file = state.files.get(path)?;
        let doc = file.doc()?;
        doc.snapshot().get("data").and_then(|v| v.as_str().map(str::to_owned))
    }

    /// Fetches the asset list (via a bulk `assets` subscribe, standing in
    /// for the REST `projectAssets` call described in §6 — see
    /// `DESIGN.md`), subscribes `documents` in bulk too, and installs the
    /// root folder, then every folder depth-ascending, then every file
    /// depth-ascending (§4.1).
    pub async fn link(self: &Arc<Self>, project_id: String, branch_id: String) -> ProjectResult<ProjectSnapshot> {
        {
            let state = self.state.lock().expect("state mutex poisoned");
            if state.linked.is_some() {
                return Err(ProjectError::ProjectAlreadyLinked);
            }
        }

        let asset_docs = self.realtime.subscribe(Collection::Assets).await.map_err(ProjectError::SubscribeFailed)?;
        let document_docs =
            self.realtime.subscribe(Collection::Documents).await.map_err(ProjectError::SubscribeFailed)?;

        {
            let mut state = self.state.lock().expect("state mutex poisoned");
            state.linked = Some(LinkedContext { project_id, branch_id, tasks: Vec::new() });
            state.files.insert(String::new(), VirtualFile::Folder { unique_id: ROOT_UNIQUE_ID });
            state.bulk_documents =
                document_docs.into_iter().map(Arc::<dyn DocHandle>::from).map(|doc| (doc.unique_id(), doc)).collect();
        }

        let asset_docs: Vec<Arc<dyn DocHandle>> = asset_docs.into_iter().map(Arc::<dyn DocHandle>::from).collect();
        let mut loaded = Vec::with_capacity(asset_docs.len());
        for batch in asset_docs.chunks(self.config.subscribe_batch_size) {
            for doc in batch {
                if let Some(asset) = self.load_asset_doc(Arc::clone(doc)).await {
                    loaded.push(asset);
                }
            }
        }
        loaded.sort_by_key(|asset| (!asset.is_folder(), asset.path.len()));
        for asset in &loaded {
            self.place_asset(asset.unique_id).await;
        }

        {
            let mut state = self.state.lock().expect("state mutex poisoned");
            state.bulk_documents.clear();
        }

        self.spawn_messenger_watcher();
        self.spawn_doc_save_watcher();

        let collided = !self.collisions().is_empty();
        if collided {
            self.alerts.alert("Some files could not be placed because their path collides with an existing one".to_string()).await;
        }

        Ok(self.snapshot())
    }

    /// Aborts every watcher task and clears all state, returning the
    /// `(projectId, branchId)` the caller needs to re-link (§4.1, §4.2's
    /// shared "linker" pattern).
    pub async fn unlink(self: &Arc<Self>) -> ProjectResult<(String, String)> {
        let (project_id, branch_id, tasks) = {
            let mut state = self.state.lock().expect("state mutex poisoned");
            let Some(ctx) = state.linked.take() else { return Err(ProjectError::ProjectNotLinked) };
            state.assets.clear();
            state.files.clear();
            state.bimap.clear();
            state.collisions.clear();
            state.collision_paths.clear();
            state.asset_json.clear();
            state.metadata_docs.clear();
            state.bulk_documents.clear();
            (ctx.project_id, ctx.branch_id, ctx.tasks)
        };
        for task in tasks {
            task.abort();
        }
        Ok((project_id, branch_id))
    }

    /// Unlinks, waits out `config.branch_switch_settle`, then re-links to
    /// `new_branch_id` on the same project (§9's branch-switch workaround
    /// for a realtime-client re-subscription race; the settle delay is a
    /// tunable [`Config`] field, not a hardcoded literal).
    pub async fn switch_branch(self: &Arc<Self>, new_branch_id: String) -> ProjectResult<ProjectSnapshot> {
        let (project_id, _old_branch_id) = self.unlink().await?;
        self.clock.sleep(self.config.branch_switch_settle).await;
        self.link(project_id, new_branch_id).await
    }

    /// Creates a new asset via REST and returns once it is visible in
    /// `files` (§4.1's `create`).
    pub async fn create(&self, path: &str, kind: CreateKind, content: Option<String>) -> ProjectResult<UniqueId> {
        let branch_id = {
            let state = self.state.lock().expect("state mutex poisoned");
            let ctx = state.linked.as_ref().ok_or(ProjectError::ProjectNotLinked)?;
            ctx.branch_id.clone()
        };

        let parent_path = parent_of(path);
        let leaf = leaf_of(path);
        if leaf.is_empty() || leaf.contains('/') {
            return Err(ProjectError::InvalidName { name: leaf.to_string() });
        }

        let parent_item_id = {
            let state = self.state.lock().expect("state mutex poisoned");
            if parent_path.is_empty() {
                None
            } else {
                match state.files.get(parent_path) {
                    Some(file) if file.is_folder() => {
                        let unique_id = file.unique_id();
                        let item_id = state
                            .bimap
                            .item_for(unique_id)
                            .ok_or(ProjectError::MissingAssetMapping { unique_id, item_id: ItemId::new(0) })?;
                        Some(item_id)
                    }
                    _ => return Err(ProjectError::MissingParent { path: path.to_string() }),
                }
            }
        };

        let (asset_kind, name, content) = match kind {
            CreateKind::Folder => (AssetKind::Folder, leaf.to_string(), None),
            CreateKind::File => {
                let ext = leaf.rsplit_once('.').map(|(_, ext)| ext);
                let (asset_kind, _mime) = AssetKind::from_extension(ext);
                let name = if ext.is_some_and(|ext| KNOWN_EXTENSIONS.contains(&ext)) {
                    leaf.to_string()
                } else {
                    format!("{leaf}.txt")
                };
                let content = content.filter(|c| !c.is_empty()).unwrap_or_else(|| "\n".to_string());
                (asset_kind, name, Some(content))
            }
        };

        let mut events = self.events.subscribe();
        let asset = self
            .rest
            .create_asset(AssetCreateRequest { name, kind: asset_kind, parent_item_id, branch_id, content })
            .await
            .map_err(ProjectError::Rest)?;
        let unique_id = asset.unique_id;

        loop {
            match events.recv().await {
                Ok(ProjectEvent::AssetCreate { unique_id: id, .. }) if id == unique_id => return Ok(unique_id),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return Err(ProjectError::ProjectNotLinked),
            }
        }
    }

    /// Deletes the asset at `path` via REST, provided it exists and its
    /// folder/file kind matches `expect_folder`; otherwise a silent no-op
    /// (§4.1's `delete`, §7's "Silent" tier).
    pub async fn delete(&self, path: &str, expect_folder: bool) -> ProjectResult<()> {
        let unique_id = {
            let state = self.state.lock().expect("state mutex poisoned");
            state.linked.as_ref().ok_or(ProjectError::ProjectNotLinked)?;
            match state.files.get(path) {
                Some(file) if file.is_folder() == expect_folder => file.unique_id(),
                _ => return Ok(()),
            }
        };

        let mut events = self.events.subscribe();
        self.rest.delete_asset(unique_id).await.map_err(ProjectError::Rest)?;

        loop {
            match events.recv().await {
                Ok(ProjectEvent::AssetDelete { unique_id: id, .. }) if id == unique_id => return Ok(()),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return Err(ProjectError::ProjectNotLinked),
            }
        }
    }

    /// Renames or reparents the asset at `old_path` to `new_path`
    /// (§4.1's `rename`): a same-parent rename goes through REST
    /// `assetRename`; a different-parent move goes through the
    /// realtime client's `move_asset`.
    pub async fn rename(&self, old_path: &str, new_path: &str) -> ProjectResult<()> {
        if old_path == new_path {
            return Ok(());
        }
        if old_path.is_empty() {
            return Err(ProjectError::CannotMoveRoot);
        }

        let (unique_id, old_parent, new_parent) = {
            let state = self.state.lock().expect("state mutex poisoned");
            state.linked.as_ref().ok_or(ProjectError::ProjectNotLinked)?;
            let Some(file) = state.files.get(old_path) else {
                return Err(ProjectError::FileNotFound { path: old_path.to_string() });
            };
            if state.files.contains_key(new_path) {
                return Err(ProjectError::FileExists { path: new_path.to_string() });
            }
            (file.unique_id(), parent_of(old_path).to_string(), parent_of(new_path).to_string())
        };

        let mut events = self.events.subscribe();

        if old_parent == new_parent {
            let new_name = leaf_of(new_path).to_string();
            self.rest.rename_asset(unique_id, new_name).await.map_err(ProjectError::Rest)?;
        } else {
            let dest_folder = if new_parent.is_empty() {
                None
            } else {
                let state = self.state.lock().expect("state mutex poisoned");
                match state.files.get(new_parent.as_str()) {
                    Some(file) if file.is_folder() => Some(file.unique_id()),
                    _ => return Err(ProjectError::DestFolderNotFound),
                }
            };
            self.realtime.move_asset(unique_id, dest_folder).await.map_err(ProjectError::Rest)?;
        }

        let new_path = new_path.to_string();
        loop {
            match events.recv().await {
                Ok(ProjectEvent::FileRename { to, .. }) if to == new_path => return Ok(()),
                Ok(ProjectEvent::AssetDelete { unique_id: id, .. }) if id == unique_id => return Ok(()),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return Err(ProjectError::ProjectNotLinked),
            }
        }
    }

    /// Full-replaces the Doc's content with `content` under the local
    /// source tag and marks the file dirty (§4.1's `write`, S2).
    pub async fn write(&self, path: &str, content: &str) -> ProjectResult<()> {
        let (doc, current_len) = {
            let state = self.state.lock().expect("state mutex poisoned");
            let Some(file) = state.files.get(path) else {
                return Err(ProjectError::FileNotFound { path: path.to_string() });
            };
            let Some(doc) = file.doc() else {
                return Err(ProjectError::FileNotFound { path: path.to_string() });
            };
            let current_len = doc.snapshot().get("data").and_then(|v| v.as_str().map(str::len)).unwrap_or(0);
            (doc, current_len)
        };

        use otsync_collab::OtArg;
        doc.submit_local_op(OtOp::Indexed(0, OtArg::Delete(current_len))).await.map_err(ProjectError::Rest)?;
        doc.submit_local_op(OtOp::Indexed(0, OtArg::Insert(content.to_string()))).await.map_err(ProjectError::Rest)?;

        let mut state = self.state.lock().expect("state mutex poisoned");
        if let Some(file) = state.files.get_mut(path) {
            file.set_dirty(true);
        }
        Ok(())
    }

    /// Submits a single already-computed text op to `path`'s Doc under the
    /// local source tag and marks the file dirty, without touching its
    /// content first (§4.2's "Editor-document watcher": the op is derived
    /// from editor content-change ranges by `otsync_codec`, not recomputed
    /// here).
    pub async fn submit_local_text_op(&self, path: &str, op: OtOp) -> ProjectResult<()> {
        let doc = {
            let state = self.state.lock().expect("state mutex poisoned");
            let Some(file) = state.files.get(path) else {
                return Err(ProjectError::FileNotFound { path: path.to_string() });
            };
            let Some(doc) = file.doc() else {
                return Err(ProjectError::FileNotFound { path: path.to_string() });
            };
            doc
        };
        doc.submit_local_op(op).await.map_err(ProjectError::Rest)?;
        let mut state = self.state.lock().expect("state mutex poisoned");
        if let Some(file) = state.files.get_mut(path) {
            file.set_dirty(true);
        }
        Ok(())
    }

    /// Requests a server-side save of the Doc's current content if the
    /// file is dirty; no-op otherwise (§4.1's `save`).
    pub async fn save(&self, path: &str) -> ProjectResult<()> {
        let (unique_id, dirty) = {
            let state = self.state.lock().expect("state mutex poisoned");
            let Some(file) = state.files.get(path) else {
                return Err(ProjectError::FileNotFound { path: path.to_string() });
            };
            let Some((_, dirty)) = file.as_file() else {
                return Err(ProjectError::FileNotFound { path: path.to_string() });
            };
            (file.unique_id(), dirty)
        };
        if !dirty {
            return Ok(());
        }
        self.realtime.request_save(unique_id).await.map_err(ProjectError::Rest)
    }

    /// Awaits the first `asset:create` event whose computed path matches
    /// `path` (§4.1's `waitForFile`).
    pub async fn wait_for_file(&self, path: &str) -> ProjectResult<UniqueId> {
        let mut events = self.events.subscribe();
        loop {
            match events.recv().await {
                Ok(ProjectEvent::AssetCreate { unique_id, path: p, .. }) if p == path => return Ok(unique_id),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return Err(ProjectError::ProjectNotLinked),
            }
        }
    }

    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<ProjectEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ProjectEvent) {
        let _ = self.events.send(event);
    }

    /// Parses a subscribed asset doc's snapshot, registers it in the
    /// bimap/asset table, and spawns its op watcher, without attempting
    /// to place it into `files` yet — `link`'s bulk path needs every
    /// asset loaded (so ancestor names resolve) before any of them is
    /// placed in depth order.
    async fn load_asset_doc(self: &Arc<Self>, doc: Arc<dyn DocHandle>) -> Option<Asset> {
        let unique_id = doc.unique_id();
        let snapshot = doc.snapshot();
        let asset: Asset = match serde_json::from_value(snapshot.clone()) {
            Ok(asset) => asset,
            Err(err) => {
                tracing::warn!(%unique_id, %err, "malformed asset snapshot, skipping");
                return None;
            }
        };
        {
            let mut state = self.state.lock().expect("state mutex poisoned");
            state.bimap.insert(asset.item_id, asset.unique_id);
            state.assets.insert(unique_id, asset.clone());
            state.asset_json.insert(unique_id, snapshot);
            state.metadata_docs.insert(unique_id, Arc::clone(&doc));
        }
        self.spawn_asset_op_watcher(unique_id, doc);
        Some(asset)
    }

    /// Loads and immediately places a single asset doc (the `asset.new`
    /// path, where there is no batch to depth-sort).
    async fn on_asset_doc(self: &Arc<Self>, doc: Arc<dyn DocHandle>) {
        let unique_id = doc.unique_id();
        if self.load_asset_doc(doc).await.is_some() {
            self.place_asset(unique_id).await;
        }
    }

    async fn track_new_asset(self: &Arc<Self>, unique_id: UniqueId) {
        match self.realtime.get_doc(Collection::Assets, unique_id).await {
            Ok(doc) => self.on_asset_doc(Arc::from(doc)).await,
            Err(err) => tracing::warn!(%unique_id, %err, "failed to fetch newly announced asset"),
        }
    }

    /// Computes where a loaded asset belongs and, for folders and
    /// ready-to-place files, installs it into `files` (subscribing the
    /// content Doc first for files). A no-op if the asset is not yet
    /// loaded, already placed, or a file still missing its storage
    /// filename (§4.1's per-asset state machine).
    async fn place_asset(self: &Arc<Self>, unique_id: UniqueId) {
        let placement = {
            let mut state = self.state.lock().expect("state mutex poisoned");
            decide_placement(&mut state, unique_id)
        };

        match placement {
            Placement::Collision { path, item_id } => {
                self.emit(ProjectEvent::Collision { path, item_id });
            }
            Placement::Folder { path, kind } => {
                {
                    let mut state = self.state.lock().expect("state mutex poisoned");
                    state.files.insert(path.clone(), VirtualFile::Folder { unique_id });
                }
                self.emit(ProjectEvent::AssetCreate { unique_id, path, kind });
            }
            Placement::File { path, kind } => {
                let claimed = {
                    let mut state = self.state.lock().expect("state mutex poisoned");
                    state.bulk_documents.remove(&unique_id)
                };
                let doc = match claimed {
                    Some(doc) => doc,
                    None => match self.realtime.get_doc(Collection::Documents, unique_id).await {
                        Ok(doc) => Arc::from(doc),
                        Err(err) => {
                            tracing::warn!(%unique_id, %err, "failed to subscribe content doc, skipping");
                            return;
                        }
                    },
                };
                let content = doc.snapshot().get("data").and_then(|v| v.as_str().map(str::to_owned)).unwrap_or_default();
                let dirty = {
                    let state = self.state.lock().expect("state mutex poisoned");
                    let hash = state.assets.get(&unique_id).and_then(|a| a.file.as_ref()).and_then(|f| f.hash.as_deref());
                    compute_dirty(&content, hash)
                };
                self.spawn_text_op_watcher(unique_id, Arc::clone(&doc));
                {
                    let mut state = self.state.lock().expect("state mutex poisoned");
                    state.files.insert(path.clone(), VirtualFile::File { unique_id, doc, dirty });
                }
                self.emit(ProjectEvent::AssetCreate { unique_id, path, kind });
            }
            Placement::PendingFilename | Placement::AlreadyPlaced | Placement::NotReady => {}
        }
    }

    async fn handle_asset_op(self: &Arc<Self>, unique_id: UniqueId, component: AssetOpComponent) {
        let events = {
            let mut state = self.state.lock().expect("state mutex poisoned");
            apply_asset_op_locked(&mut state, unique_id, &component)
        };
        for event in events {
            self.emit(event);
        }
        self.place_asset(unique_id).await;
    }

    async fn handle_remote_text_op(self: &Arc<Self>, unique_id: UniqueId, op: OtOp, new_content: String) {
        let Some(path) = self.path(unique_id) else { return };
        self.emit(ProjectEvent::FileUpdate { path, op, new_content });
    }

    async fn handle_asset_removed(self: &Arc<Self>, unique_id: UniqueId) {
        let path = {
            let mut state = self.state.lock().expect("state mutex poisoned");
            if state.assets.remove(&unique_id).is_none() {
                return;
            }
            state.asset_json.remove(&unique_id);
            state.metadata_docs.remove(&unique_id);
            state.bimap.remove_by_unique(unique_id);
            state.collisions.unmark(unique_id);
            state.collision_paths.retain(|_, (uid, _)| *uid != unique_id);
            let path = state.files.iter().find(|(_, file)| file.unique_id() == unique_id).map(|(path, _)| path.clone());
            if let Some(path) = &path {
                state.files.remove(path);
            }
            path
        };
        self.emit(ProjectEvent::AssetDelete { unique_id, path: path.unwrap_or_default() });
    }

    async fn handle_doc_save(self: &Arc<Self>, unique_id: UniqueId, state_result: DocSaveState) {
        if state_result != DocSaveState::Success {
            tracing::warn!(%unique_id, "server reported a failed document save");
            return;
        }
        let path = {
            let mut state = self.state.lock().expect("state mutex poisoned");
            let path = state.files.iter().find(|(_, file)| file.unique_id() == unique_id).map(|(path, _)| path.clone());
            if let Some(path) = &path {
                if let Some(file) = state.files.get_mut(path) {
                    file.set_dirty(false);
                }
            }
            path
        };
        if let Some(path) = path {
            self.emit(ProjectEvent::FileSave { path });
        }
    }

    fn spawn_asset_op_watcher(self: &Arc<Self>, unique_id: UniqueId, doc: Arc<dyn DocHandle>) {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut events = doc.events();
            while let Some(event) = events.next().await {
                match event {
                    DocEvent::Op { op, source } if source.as_deref() != Some(LOCAL_OT_SOURCE) => {
                        match AssetOpComponent::from_json(&op) {
                            Ok(component) => this.handle_asset_op(unique_id, component).await,
                            Err(err) => tracing::warn!(%unique_id, %err, "malformed asset op, skipping"),
                        }
                    }
                    DocEvent::Op { .. } => {}
                    DocEvent::Deleted => {
                        this.handle_asset_removed(unique_id).await;
                        break;
                    }
                }
            }
        });
        self.track_task(handle);
    }

    fn spawn_text_op_watcher(self: &Arc<Self>, unique_id: UniqueId, doc: Arc<dyn DocHandle>) {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut events = doc.events();
            while let Some(event) = events.next().await {
                match event {
                    DocEvent::Op { op, source } if source.as_deref() != Some(LOCAL_OT_SOURCE) => {
                        let Ok(parsed) = OtOp::from_json(&op) else {
                            tracing::warn!(%unique_id, "malformed text op, skipping");
                            continue;
                        };
                        let content = doc.snapshot().get("data").and_then(|v| v.as_str().map(str::to_owned)).unwrap_or_default();
                        this.handle_remote_text_op(unique_id, parsed, content).await;
                    }
                    DocEvent::Op { .. } => {}
                    DocEvent::Deleted => break,
                }
            }
        });
        self.track_task(handle);
    }

    fn spawn_messenger_watcher(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let mut events = self.messenger.events();
        let handle = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match event {
                    MessengerEvent::AssetNew { unique_id, .. } => this.track_new_asset(unique_id).await,
                    MessengerEvent::AssetsDelete { unique_ids } => {
                        for unique_id in unique_ids {
                            this.handle_asset_removed(unique_id).await;
                        }
                    }
                }
            }
        });
        self.track_task(handle);
    }

    fn spawn_doc_save_watcher(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let mut saves = self.messenger.doc_saves();
        let handle = tokio::spawn(async move {
            while let Some(event) = saves.next().await {
                this.handle_doc_save(event.unique_id, event.state).await;
            }
        });
        self.track_task(handle);
    }

    fn track_task(&self, handle: JoinHandle<()>) {
        let mut state = self.state.lock().expect("state mutex poisoned");
        match state.linked.as_mut() {
            Some(ctx) => ctx.tasks.push(handle),
            None => handle.abort(),
        }
    }
}

fn compute_dirty(data: &str, hash: Option<&str>) -> bool {
    match hash {
        Some(hash) => format!("{:x}", md5::compute(data)) != hash,
        None => true,
    }
}

fn decide_placement(state: &mut State, unique_id: UniqueId) -> Placement {
    let Some(asset) = state.assets.get(&unique_id).cloned() else { return Placement::NotReady };

    if state.collisions.contains(unique_id) || state.files.values().any(|file| file.unique_id() == unique_id) {
        return Placement::AlreadyPlaced;
    }

    let item_id = state.bimap.item_for(unique_id).unwrap_or(asset.item_id);
    let ancestor_unique_ids = ancestor_unique_ids(state, &asset);

    if state.collisions.any_ancestor_collided(&ancestor_unique_ids) {
        let path = fold_path(&state.bimap, &asset.path, &asset.name, |uid| state.assets.get(&uid).map(|a| a.name.clone()))
            .unwrap_or_else(|_| asset.name.clone());
        state.collisions.mark(unique_id);
        state.collision_paths.insert(path.clone(), (unique_id, item_id));
        return Placement::Collision { path, item_id };
    }

    let path = match fold_path(&state.bimap, &asset.path, &asset.name, |uid| state.assets.get(&uid).map(|a| a.name.clone())) {
        Ok(path) => path,
        Err(_) => return Placement::NotReady,
    };

    if state.files.contains_key(&path) {
        state.collisions.mark(unique_id);
        state.collision_paths.insert(path.clone(), (unique_id, item_id));
        return Placement::Collision { path, item_id };
    }

    if asset.is_folder() {
        Placement::Folder { path, kind: asset.kind }
    } else if asset.file.as_ref().and_then(|file| file.filename.as_ref()).is_some() {
        Placement::File { path, kind: asset.kind }
    } else {
        Placement::PendingFilename
    }
}

fn ancestor_unique_ids(state: &State, asset: &Asset) -> Vec<UniqueId> {
    asset.path.iter().filter_map(|item_id| state.bimap.unique_for(*item_id)).collect()
}

fn current_or_virtual_path(state: &State, asset: &Asset, unique_id: UniqueId) -> Option<String> {
    if let Some((path, _)) = state.files.iter().find(|(_, file)| file.unique_id() == unique_id) {
        return Some(path.clone());
    }
    fold_path(&state.bimap, &asset.path, &asset.name, |uid| state.assets.get(&uid).map(|a| a.name.clone())).ok()
}

/// Applies one json0 op to the tracked asset and reacts to whichever
/// top-level field changed (§4.1's "Asset:update reactions"), returning
/// the events to emit once the state lock is released. Does not itself
/// attempt to place a not-yet-placed asset; the caller always follows up
/// with `place_asset`, which is what actually installs a file once its
/// `file.filename` arrives via exactly this path.
fn apply_asset_op_locked(state: &mut State, unique_id: UniqueId, component: &AssetOpComponent) -> Vec<ProjectEvent> {
    let mut events = Vec::new();
    let Some(old_asset) = state.assets.get(&unique_id).cloned() else { return events };
    let Some(json) = state.asset_json.get_mut(&unique_id) else { return events };

    let field = match crate::asset_op::apply(json, component) {
        Ok(Some(field)) => field,
        Ok(None) => return events,
        Err(err) => {
            tracing::warn!(%unique_id, %err, "asset op traversed a non-object value, skipping");
            return events;
        }
    };
    let new_asset: Asset = match serde_json::from_value(json.clone()) {
        Ok(asset) => asset,
        Err(err) => {
            tracing::warn!(%unique_id, %err, "asset snapshot no longer deserializes, skipping");
            return events;
        }
    };
    state.assets.insert(unique_id, new_asset.clone());

    match AssetField::from_key(&field) {
        AssetField::Name | AssetField::Path => {
            let Ok(new_path) =
                fold_path(&state.bimap, &new_asset.path, &new_asset.name, |uid| state.assets.get(&uid).map(|a| a.name.clone()))
            else {
                return events;
            };
            let old_path = current_or_virtual_path(state, &old_asset, unique_id);
            if old_path.as_deref() == Some(new_path.as_str()) {
                return events;
            }
            let was_placed = old_path.as_deref().is_some_and(|path| state.files.contains_key(path));
            let item_id = state.bimap.item_for(unique_id).unwrap_or(new_asset.item_id);
            let ancestors_collided = state.collisions.any_ancestor_collided(&ancestor_unique_ids(state, &new_asset));

            if state.files.contains_key(&new_path) || ancestors_collided {
                if was_placed {
                    let from = old_path.expect("was_placed implies old_path is Some");
                    state.files.remove(&from);
                    events.push(ProjectEvent::FileDelete { path: from });
                    events.push(ProjectEvent::Collision { path: new_path.clone(), item_id });
                }
                state.collisions.mark(unique_id);
                state.collision_paths.insert(new_path, (unique_id, item_id));
            } else if was_placed {
                let from = old_path.expect("was_placed implies old_path is Some");
                relabel_prefix(&mut state.files, &from, &new_path);
                state.collisions.unmark(unique_id);
                state.collision_paths.remove(&from);
                events.push(ProjectEvent::FileRename { from, to: new_path });
            }
        }
        AssetField::File => {
            let old_path = current_or_virtual_path(state, &old_asset, unique_id);
            if let Some(path) = old_path.filter(|path| state.files.contains_key(path)) {
                if let Some(file) = state.files.get_mut(&path) {
                    file.set_dirty(false);
                }
                events.push(ProjectEvent::FileSave { path });
            }
        }
        AssetField::Other => {}
    }

    events
}

/// Moves every `files` entry at `from` or nested under `from/` to the
/// equivalent key under `to` (§4.1's rename reaction: "move every `files`
/// entry whose key starts with `from` to the corresponding `to`-prefixed
/// key").
fn relabel_prefix(files: &mut HashMap<String, VirtualFile>, from: &str, to: &str) {
    let prefix = format!("{from}/");
    let affected: Vec<String> = files.keys().filter(|path| *path == from || path.starts_with(&prefix)).cloned().collect();
    for old_key in affected {
        let Some(file) = files.remove(&old_key) else { continue };
        let new_key = if old_key == from { to.to_string() } else { format!("{to}{}", &old_key[from.len()..]) };
        files.insert(new_key, file);
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..index],
        None => "",
    }
}

fn leaf_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[index + 1..],
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_and_leaf_split_nested_paths() {
        assert_eq!(parent_of("a/b/c.js"), "a/b");
        assert_eq!(leaf_of("a/b/c.js"), "c.js");
        assert_eq!(parent_of("a.js"), "");
        assert_eq!(leaf_of("a.js"), "a.js");
    }

    #[test]
    fn relabel_prefix_moves_exact_and_nested_entries() {
        let mut files = HashMap::new();
        files.insert("src".to_string(), VirtualFile::Folder { unique_id: UniqueId::new(1) });
        files.insert("src/a.js".to_string(), VirtualFile::Folder { unique_id: UniqueId::new(2) });
        files.insert("srclib".to_string(), VirtualFile::Folder { unique_id: UniqueId::new(3) });
        relabel_prefix(&mut files, "src", "lib");
        assert!(files.contains_key("lib"));
        assert!(files.contains_key("lib/a.js"));
        assert!(files.contains_key("srclib"));
        assert!(!files.contains_key("src"));
        assert!(!files.contains_key("src/a.js"));
    }
}
