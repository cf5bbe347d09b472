use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use camino::Utf8Path;
use camino::Utf8PathBuf;
use otsync_codec::editor_changes_to_ops;
use otsync_codec::sharedb_to_editor;
use otsync_codec::EditorChange;
use otsync_collab::AlertSink;
use otsync_collab::AssetKind;
use otsync_collab::Clock;
use otsync_collab::Config;
use otsync_collab::DocumentEvent;
use otsync_collab::EditorHost;
use otsync_collab::FileStat;
use otsync_collab::FsEvent;
use otsync_collab::OtOp;
use otsync_project::CreateKind;
use otsync_project::ProjectEvent;
use otsync_project::ProjectSnapshot;
use otsync_project::VirtualProject;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt as _;

use crate::coalesce;
use crate::coalesce::DeferOp;
use crate::coalesce::ResolvedOp;
use crate::echo::EchoSet;
use crate::error::MirrorError;
use crate::error::MirrorResult;
use crate::ignore_rules::IgnoreRules;
use crate::path_mutex::PathMutex;
use crate::scheduler::DependencyScheduler;
use crate::scheduler::Reservation;

/// A linked project plus everything its three watcher tasks share (§4.2).
struct LinkedContext {
    project: Arc<VirtualProject>,
    ignore: IgnoreRules,
    echo: Arc<EchoSet>,
    path_mutex: Arc<PathMutex>,
    scheduler: Arc<DependencyScheduler>,
    queue: Arc<StdMutex<Vec<DeferOp>>>,
    tasks: Vec<JoinHandle<()>>,
}

/// Handles to a [`LinkedContext`]'s shared collaborators, cloned out from
/// under the state lock once per operation so nothing holds a
/// `std::sync::Mutex` guard across an `.await`.
#[derive(Clone)]
struct LinkedHandles {
    ignore: IgnoreRules,
    echo: Arc<EchoSet>,
    path_mutex: Arc<PathMutex>,
    scheduler: Arc<DependencyScheduler>,
    queue: Arc<StdMutex<Vec<DeferOp>>>,
}

#[derive(Default)]
struct State {
    linked: Option<LinkedContext>,
}

/// The disk-facing half of the sync engine (§4.2): binds a
/// [`VirtualProject`] to an [`EditorHost`] so each mutates the other,
/// materializing remote asset/text changes on disk and open documents, and
/// reflecting local disk/editor activity back onto the model.
pub struct DiskMirror {
    host: Arc<dyn EditorHost>,
    alerts: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    config: Config,
    state: StdMutex<State>,
}

impl DiskMirror {
    #[must_use]
    pub fn new(
        host: Arc<dyn EditorHost>,
        alerts: Arc<dyn AlertSink>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Arc<Self> {
        Arc::new(Self { host, alerts, clock, config, state: StdMutex::new(State::default()) })
    }

    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.state.lock().expect("mirror state mutex poisoned").linked.is_some()
    }

    fn handles(&self) -> MirrorResult<LinkedHandles> {
        let state = self.state.lock().expect("mirror state mutex poisoned");
        let ctx = state.linked.as_ref().ok_or(MirrorError::NotLinked)?;
        Ok(LinkedHandles {
            ignore: ctx.ignore.clone(),
            echo: Arc::clone(&ctx.echo),
            path_mutex: Arc::clone(&ctx.path_mutex),
            scheduler: Arc::clone(&ctx.scheduler),
            queue: Arc::clone(&ctx.queue),
        })
    }

    fn track_task(&self, handle: JoinHandle<()>) {
        let mut state = self.state.lock().expect("mirror state mutex poisoned");
        match state.linked.as_mut() {
            Some(ctx) => ctx.tasks.push(handle),
            None => handle.abort(),
        }
    }

    /// Binds to `project`: reads `.pcignore` from the model, reconciles the
    /// disk against the model's current snapshot, optionally opens
    /// `open_path` as a visible document, then starts the three watcher
    /// tasks (§4.2's `link`).
    pub async fn link(
        self: &Arc<Self>,
        project: Arc<VirtualProject>,
        open_path: Option<&str>,
    ) -> MirrorResult<()> {
        {
            let state = self.state.lock().expect("mirror state mutex poisoned");
            if state.linked.is_some() {
                return Err(MirrorError::AlreadyLinked);
            }
        }

        let ignore = match project.content(&self.config.ignore_file_name) {
            Some(content) => IgnoreRules::from_content(&content, self.config.ignore_file_name.clone()),
            None => IgnoreRules::empty(self.config.ignore_file_name.clone()),
        };

        {
            let mut state = self.state.lock().expect("mirror state mutex poisoned");
            state.linked = Some(LinkedContext {
                project: Arc::clone(&project),
                ignore,
                echo: Arc::new(EchoSet::new()),
                path_mutex: Arc::new(PathMutex::new()),
                scheduler: Arc::new(DependencyScheduler::new()),
                queue: Arc::new(StdMutex::new(Vec::new())),
                tasks: Vec::new(),
            });
        }

        self.reconcile(&project).await?;

        if let Some(path) = open_path {
            if let Err(err) = self.host.open_document(Utf8Path::new(path)).await {
                tracing::warn!(%err, path, "failed to open initial document");
            }
        }

        self.spawn_model_watcher(Arc::clone(&project));
        self.spawn_document_watcher(Arc::clone(&project));
        self.spawn_disk_watcher(Arc::clone(&project));

        Ok(())
    }

    /// Aborts every watcher task and drops the echo set, path mutex,
    /// scheduler, and coalescer queue, returning the workspace root and the
    /// project for a caller that wants to re-link (§4.2's `unlink`).
    pub async fn unlink(self: &Arc<Self>) -> MirrorResult<(Utf8PathBuf, Arc<VirtualProject>)> {
        let (project, tasks) = {
            let mut state = self.state.lock().expect("mirror state mutex poisoned");
            let ctx = state.linked.take().ok_or(MirrorError::NotLinked)?;
            (ctx.project, ctx.tasks)
        };
        for task in tasks {
            task.abort();
        }
        Ok((self.host.workspace_root().to_path_buf(), project))
    }

    /// Creates every model path on disk (folders depth-ascending, as the
    /// snapshot already orders them), then walks the disk looking for
    /// entries the model doesn't know about and deletes them (§4.2's
    /// reconciliation pass).
    async fn reconcile(&self, project: &Arc<VirtualProject>) -> MirrorResult<()> {
        let snapshot = project.snapshot();
        for path in snapshot.paths_depth_first() {
            if path.is_empty() {
                continue;
            }
            let is_folder = snapshot.is_folder(&path).unwrap_or(false);
            let kind = if is_folder { CreateKind::Folder } else { CreateKind::File };
            let content = if is_folder { None } else { project.content(&path) };
            self.create_on_disk(Utf8Path::new(&path), kind, content.as_deref()).await?;
        }
        self.delete_untracked(&snapshot).await?;
        Ok(())
    }

    async fn delete_untracked(&self, snapshot: &ProjectSnapshot) -> MirrorResult<()> {
        let handles = self.handles()?;
        let mut stack = vec![Utf8PathBuf::new()];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = self.host.read_dir(&dir).await else { continue };
            for (rel_path, stat) in entries {
                if handles.ignore.is_ignored(&rel_path, stat == FileStat::Directory) {
                    continue;
                }
                if snapshot.contains_path(rel_path.as_str()) {
                    if stat == FileStat::Directory {
                        stack.push(rel_path);
                    }
                    continue;
                }
                self.delete_on_disk(&handles, &rel_path).await?;
            }
        }
        Ok(())
    }

    /// §4.2's `_create`: a no-op if the path is ignored, already exists as
    /// a folder, or already exists as a file with byte-identical content;
    /// fails if the parent folder is missing on disk.
    async fn create_on_disk(
        &self,
        path: &Utf8Path,
        kind: CreateKind,
        content: Option<&str>,
    ) -> MirrorResult<()> {
        let handles = self.handles()?;
        self.create_on_disk_with(&handles, path, kind, content).await
    }

    async fn create_on_disk_with(
        &self,
        handles: &LinkedHandles,
        path: &Utf8Path,
        kind: CreateKind,
        content: Option<&str>,
    ) -> MirrorResult<()> {
        if path.as_str().is_empty() {
            return Ok(());
        }
        let is_dir = matches!(kind, CreateKind::Folder);
        if handles.ignore.is_ignored(path, is_dir) {
            return Ok(());
        }

        let _guard = handles.path_mutex.lock(path.as_str()).await;

        match self.host.stat(path).await.map_err(MirrorError::Host)? {
            Some(FileStat::Directory) => return Ok(()),
            Some(FileStat::File) if !is_dir => {
                if let Some(content) = content {
                    let existing = self.host.read_to_string(path).await.map_err(MirrorError::Host)?;
                    if existing == content {
                        return Ok(());
                    }
                }
            }
            _ => {}
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            match self.host.stat(parent).await.map_err(MirrorError::Host)? {
                Some(FileStat::Directory) => {}
                _ => return Err(MirrorError::MissingParentDir { path: path.to_path_buf() }),
            }
        }

        handles.echo.insert(format!("{path}:create"));
        if is_dir {
            self.host.create_dir(path).await.map_err(MirrorError::Host)?;
        } else {
            self.host.write(path, content.unwrap_or_default()).await.map_err(MirrorError::Host)?;
        }
        Ok(())
    }

    /// §4.2's `_update`: if the document is open and clean (its buffer
    /// matches what's on disk), applies `op` as a workspace edit so the
    /// open view updates; either way, writes `content` to disk under an
    /// echo key, preserving an unsaved local buffer untouched.
    async fn update_on_disk(&self, path: &Utf8Path, op: OtOp, content: &str) -> MirrorResult<()> {
        let handles = self.handles()?;
        let _guard = handles.path_mutex.lock(path.as_str()).await;

        if let Some(buffer_text) = self.host.open_buffer_contents(path).await.map_err(MirrorError::Host)? {
            let disk_text = self.host.read_to_string(path).await.unwrap_or_default();
            if buffer_text == disk_text {
                let edits = sharedb_to_editor(&buffer_text, std::slice::from_ref(&op));
                self.host.apply_edits(path, edits).await.map_err(MirrorError::Host)?;
            }
        }

        handles.echo.insert(format!("{path}:change"));
        self.host.write(path, content).await.map_err(MirrorError::Host)?;
        Ok(())
    }

    /// §4.2's `_delete`: a no-op if the path is already absent.
    async fn delete_on_disk(&self, handles: &LinkedHandles, path: &Utf8Path) -> MirrorResult<()> {
        let _guard = handles.path_mutex.lock(path.as_str()).await;
        match self.host.stat(path).await.map_err(MirrorError::Host)? {
            Some(FileStat::Directory) => {
                handles.echo.insert(format!("{path}:delete"));
                self.host.remove_dir(path).await.map_err(MirrorError::Host)?;
            }
            Some(FileStat::File) => {
                handles.echo.insert(format!("{path}:delete"));
                self.host.remove_file(path).await.map_err(MirrorError::Host)?;
            }
            None => {}
        }
        Ok(())
    }

    /// §4.2's `_rename`: registers a delete echo for the old path and a
    /// create echo for the new one, mirroring how the disk watcher's
    /// coalescer would otherwise have observed a plain delete+create.
    async fn rename_on_disk(&self, old: &Utf8Path, new: &Utf8Path) -> MirrorResult<()> {
        let handles = self.handles()?;
        let _old_guard = handles.path_mutex.lock(old.as_str()).await;
        let _new_guard = handles.path_mutex.lock(new.as_str()).await;
        if self.host.stat(old).await.map_err(MirrorError::Host)?.is_none() {
            return Ok(());
        }
        handles.echo.insert(format!("{old}:delete"));
        handles.echo.insert(format!("{new}:create"));
        self.host.rename(old, new).await.map_err(MirrorError::Host)?;
        Ok(())
    }

    fn spawn_model_watcher(self: &Arc<Self>, project: Arc<VirtualProject>) {
        let this = Arc::clone(self);
        let mut events = project.subscribe_events();
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => this.handle_project_event(&project, event).await,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        self.track_task(handle);
    }

    async fn handle_project_event(&self, project: &Arc<VirtualProject>, event: ProjectEvent) {
        match event {
            ProjectEvent::AssetCreate { path, kind, .. } => {
                let create_kind = if kind == AssetKind::Folder { CreateKind::Folder } else { CreateKind::File };
                let content =
                    if create_kind == CreateKind::Folder { None } else { project.content(&path) };
                if let Err(err) =
                    self.create_on_disk(Utf8Path::new(&path), create_kind, content.as_deref()).await
                {
                    tracing::warn!(%err, path, "failed to materialize asset on disk");
                }
            }
            ProjectEvent::AssetDelete { path, .. } | ProjectEvent::FileDelete { path } => {
                if path.is_empty() {
                    return;
                }
                let Ok(handles) = self.handles() else { return };
                if let Err(err) = self.delete_on_disk(&handles, Utf8Path::new(&path)).await {
                    tracing::warn!(%err, path, "failed to delete asset from disk");
                }
            }
            ProjectEvent::FileUpdate { path, op, new_content } => {
                if let Err(err) = self.update_on_disk(Utf8Path::new(&path), op, &new_content).await {
                    tracing::warn!(%err, path, "failed to apply remote text op to disk");
                }
            }
            ProjectEvent::FileRename { from, to } => {
                if let Err(err) = self.rename_on_disk(Utf8Path::new(&from), Utf8Path::new(&to)).await {
                    tracing::warn!(%err, from, to, "failed to rename asset on disk");
                }
            }
            ProjectEvent::Collision { path, item_id } => {
                self.alerts
                    .alert(format!("\"{path}\" could not be placed: it collides with an existing asset ({item_id})"))
                    .await;
            }
            ProjectEvent::AssetUpdate { .. } | ProjectEvent::FileSave { .. } => {}
        }
    }

    fn spawn_document_watcher(self: &Arc<Self>, project: Arc<VirtualProject>) {
        let this = Arc::clone(self);
        let mut events = self.host.document_events();
        let handle = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                this.handle_document_event(&project, event).await;
            }
        });
        self.track_task(handle);
    }

    async fn handle_document_event(&self, project: &Arc<VirtualProject>, event: DocumentEvent) {
        match event {
            DocumentEvent::Changed { path, changes } => {
                let path_str = path.as_str();
                let snapshot = project.snapshot();
                if snapshot.is_folder(path_str) != Some(false) {
                    return;
                }
                let Ok(Some(editor_text)) = self.host.open_buffer_contents(&path).await else { return };
                if project.content(path_str).as_deref() == Some(editor_text.as_str()) {
                    return;
                }
                let raw: Vec<EditorChange> =
                    changes.iter().map(|c| EditorChange::new(c.range_offset, c.range_length, c.text.clone())).collect();
                for op in editor_changes_to_ops(&raw) {
                    if let Err(err) = project.submit_local_text_op(path_str, op).await {
                        tracing::warn!(%err, path_str, "failed to submit local text op");
                    }
                }
            }
            DocumentEvent::SaveRequested { path } => {
                let path_str = path.as_str();
                let Ok(Some(text)) = self.host.open_buffer_contents(&path).await else { return };
                if let Err(err) = project.write(path_str, &text).await {
                    tracing::warn!(%err, path_str, "failed to write saved buffer");
                }
                if let Err(err) = project.save(path_str).await {
                    tracing::warn!(%err, path_str, "failed to request server save");
                }
            }
        }
    }

    fn spawn_disk_watcher(self: &Arc<Self>, project: Arc<VirtualProject>) {
        let this = Arc::clone(self);
        let mut events = self.host.watch();
        let handle = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                this.handle_disk_event(&project, event).await;
            }
        });
        self.track_task(handle);
    }

    async fn handle_disk_event(self: &Arc<Self>, project: &Arc<VirtualProject>, event: FsEvent) {
        let Ok(handles) = self.handles() else { return };

        let key = match &event {
            FsEvent::Created(p) => format!("{p}:create"),
            FsEvent::Changed(p) => format!("{p}:change"),
            FsEvent::Deleted(p) => format!("{p}:delete"),
        };
        if handles.echo.consume(&key) {
            return;
        }

        let defer = match event {
            FsEvent::Created(p) => DeferOp::Created(p),
            FsEvent::Changed(p) => DeferOp::Changed(p),
            FsEvent::Deleted(p) => DeferOp::Deleted(p),
        };

        let should_spawn = {
            let mut queue = handles.queue.lock().expect("disk queue poisoned");
            queue.push(defer);
            queue.len() == 1
        };

        if should_spawn {
            let this = Arc::clone(self);
            let project = Arc::clone(project);
            let clock = Arc::clone(&self.clock);
            let debounce = self.config.coalesce_debounce;
            let queue = Arc::clone(&handles.queue);
            tokio::spawn(async move {
                clock.sleep(debounce).await;
                this.drain_disk_queue(&project, &queue).await;
            });
        }
    }

    async fn drain_disk_queue(self: &Arc<Self>, project: &Arc<VirtualProject>, queue: &StdMutex<Vec<DeferOp>>) {
        let batch = {
            let mut queue = queue.lock().expect("disk queue poisoned");
            std::mem::take(&mut *queue)
        };
        if batch.is_empty() {
            return;
        }
        let Ok(handles) = self.handles() else { return };

        let resolved = coalesce::resolve(batch);
        // Each op's scheduler slot must be registered in queue order, here,
        // synchronously, before any of them are spawned — a reservation
        // made only after a task starts running can't guarantee a parent's
        // slot exists before its child's `reserve()` call runs (§4.2 step
        // 4: parent-folder creation must precede dependent child creation).
        let reservations: Vec<(ResolvedOp, Reservation)> = resolved
            .into_iter()
            .map(|op| {
                let reservation = handles.scheduler.reserve(op.key());
                (op, reservation)
            })
            .collect();

        let mut tasks = Vec::with_capacity(reservations.len());
        for (op, reservation) in reservations {
            let this = Arc::clone(self);
            let project = Arc::clone(project);
            tasks.push(tokio::spawn(async move {
                this.dispatch_resolved(&project, reservation, op).await;
            }));
        }
        for task in tasks {
            let _ = task.await;
        }
    }

    /// Runs one coalesced local filesystem operation back onto the model,
    /// waiting out `reservation`'s related in-flight operations first
    /// (§4.2's drain procedure, step 3).
    async fn dispatch_resolved(&self, project: &Arc<VirtualProject>, reservation: Reservation, op: ResolvedOp) {
        match op {
            ResolvedOp::Rename(from, to) => {
                let project = Arc::clone(project);
                reservation
                    .run(|| async move {
                        if let Err(err) = project.rename(from.as_str(), to.as_str()).await {
                            tracing::warn!(%err, from = %from, to = %to, "failed to apply local rename");
                        }
                    })
                    .await;
            }
            ResolvedOp::Create(path) => {
                let project = Arc::clone(project);
                let host = Arc::clone(&self.host);
                reservation
                    .run(|| async move {
                        let is_dir = matches!(host.stat(&path).await, Ok(Some(FileStat::Directory)));
                        let kind = if is_dir { CreateKind::Folder } else { CreateKind::File };
                        let content = if is_dir { None } else { host.read_to_string(&path).await.ok() };
                        if let Err(err) = project.create(path.as_str(), kind, content).await {
                            tracing::warn!(%err, path = %path, "failed to create asset from local fs event");
                        }
                    })
                    .await;
            }
            ResolvedOp::Change(path) => {
                let project = Arc::clone(project);
                let host = Arc::clone(&self.host);
                reservation
                    .run(|| async move {
                        let Ok(content) = host.read_to_string(&path).await else { return };
                        if let Err(err) = project.write(path.as_str(), &content).await {
                            tracing::warn!(%err, path = %path, "failed to write asset from local fs event");
                        }
                    })
                    .await;
            }
            ResolvedOp::Delete(path) => {
                let project = Arc::clone(project);
                reservation
                    .run(|| async move {
                        let expect_folder = project.snapshot().is_folder(path.as_str()).unwrap_or(false);
                        if let Err(err) = project.delete(path.as_str(), expect_folder).await {
                            tracing::warn!(%err, path = %path, "failed to delete asset from local fs event");
                        }
                    })
                    .await;
            }
        }
    }
}
