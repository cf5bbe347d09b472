//! Exercises `DiskMirror` end to end: a `VirtualProject` bound to a
//! `FakeEditorHost` backed by a real temp directory, so reconciliation,
//! remote-edit application, and local disk-event coalescing all run
//! against actual filesystem operations.

use std::sync::Arc;

use camino::Utf8Path;
use camino::Utf8PathBuf;
use otsync_collab::fake::FakeAlertSink;
use otsync_collab::fake::FakeEditorHost;
use otsync_collab::fake::FakeMessenger;
use otsync_collab::fake::FakeRealtimeClient;
use otsync_collab::fake::FakeRestClient;
use otsync_collab::AlertSink;
use otsync_collab::Asset;
use otsync_collab::AssetFile;
use otsync_collab::AssetKind;
use otsync_collab::Clock;
use otsync_collab::Collection;
use otsync_collab::Config;
use otsync_collab::EditorHost;
use otsync_collab::FsEvent;
use otsync_collab::ItemId;
use otsync_collab::ManualClock;
use otsync_collab::Messenger;
use otsync_collab::MessengerEvent;
use otsync_collab::RealtimeClient;
use otsync_collab::RestClient;
use otsync_collab::UniqueId;
use otsync_mirror::DiskMirror;
use otsync_project::VirtualProject;

struct Harness {
    project: Arc<VirtualProject>,
    mirror: Arc<DiskMirror>,
    realtime: Arc<FakeRealtimeClient>,
    rest: Arc<FakeRestClient>,
    editor: Arc<FakeEditorHost>,
}

fn harness() -> Harness {
    let _ = tracing_subscriber::fmt::try_init();
    let realtime = Arc::new(FakeRealtimeClient::new());
    let rest = Arc::new(FakeRestClient::new());
    let messenger = Arc::new(FakeMessenger::new());
    let alerts = Arc::new(FakeAlertSink::new());
    let project_clock = Arc::new(ManualClock::new());
    let mirror_clock = Arc::new(ManualClock::new());
    let project = VirtualProject::new(
        Arc::clone(&realtime) as Arc<dyn RealtimeClient>,
        Arc::clone(&rest) as Arc<dyn RestClient>,
        Arc::clone(&messenger) as Arc<dyn Messenger>,
        Arc::clone(&alerts) as Arc<dyn AlertSink>,
        project_clock as Arc<dyn Clock>,
        Config::default(),
    );
    let editor = Arc::new(FakeEditorHost::new());
    let mirror = DiskMirror::new(
        Arc::clone(&editor) as Arc<dyn EditorHost>,
        Arc::clone(&alerts) as Arc<dyn AlertSink>,
        mirror_clock as Arc<dyn Clock>,
        Config::default(),
    );
    Harness { project, mirror, realtime, rest, editor }
}

fn file_asset(unique_id: u64, item_id: u32, name: &str, path: Vec<ItemId>, hash: &str) -> Asset {
    Asset {
        unique_id: UniqueId::new(unique_id),
        item_id: ItemId::new(item_id),
        kind: AssetKind::Script,
        name: name.to_string(),
        path,
        file: Some(AssetFile { filename: Some(name.to_string()), hash: Some(hash.to_string()) }),
        branch_id: "main".to_string(),
    }
}

fn folder_asset(unique_id: u64, item_id: u32, name: &str, path: Vec<ItemId>) -> Asset {
    Asset {
        unique_id: UniqueId::new(unique_id),
        item_id: ItemId::new(item_id),
        kind: AssetKind::Folder,
        name: name.to_string(),
        path,
        file: None,
        branch_id: "main".to_string(),
    }
}

async fn until<F: Fn() -> bool>(predicate: F) {
    let mut spins = 0;
    while !predicate() {
        spins += 1;
        assert!(spins < 100_000, "condition never became true");
        tokio::task::yield_now().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn link_materializes_model_files_and_deletes_untracked_disk_entries() {
    let h = harness();

    let ignore = file_asset(1, 1, ".pcignore", vec![], &format!("{:x}", md5::compute("ignored.log\n")));
    let hash = format!("{:x}", md5::compute("hello"));
    let file = file_asset(2, 2, "a.js", vec![], &hash);
    h.realtime.insert(Collection::Assets, ignore.unique_id, serde_json::to_value(&ignore).unwrap());
    h.realtime.insert(Collection::Documents, ignore.unique_id, serde_json::json!({"data": "ignored.log\n"}));
    h.realtime.insert(Collection::Assets, file.unique_id, serde_json::to_value(&file).unwrap());
    h.realtime.insert(Collection::Documents, file.unique_id, serde_json::json!({"data": "hello"}));

    tokio::fs::write(h.editor.root().path().join("stray.txt"), "leftover").await.unwrap();
    tokio::fs::write(h.editor.root().path().join("ignored.log"), "keep me").await.unwrap();

    h.project.link("proj-1".to_string(), "main".to_string()).await.unwrap();
    h.mirror.link(Arc::clone(&h.project), None).await.unwrap();

    assert_eq!(tokio::fs::read_to_string(h.editor.root().path().join("a.js")).await.unwrap(), "hello");
    assert!(tokio::fs::metadata(h.editor.root().path().join("stray.txt")).await.is_err());
    assert_eq!(tokio::fs::read_to_string(h.editor.root().path().join("ignored.log")).await.unwrap(), "keep me");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn remote_text_op_applies_to_an_open_clean_buffer_and_to_disk() {
    let h = harness();

    let hash = format!("{:x}", md5::compute("hello"));
    let file = file_asset(3, 3, "a.js", vec![], &hash);
    h.realtime.insert(Collection::Assets, file.unique_id, serde_json::to_value(&file).unwrap());
    let doc = h.realtime.insert(Collection::Documents, file.unique_id, serde_json::json!({"data": "hello"}));

    h.project.link("proj-1".to_string(), "main".to_string()).await.unwrap();
    h.mirror.link(Arc::clone(&h.project), None).await.unwrap();

    h.editor.open_document(Utf8Path::new("a.js")).await.unwrap();
    assert_eq!(h.editor.open_buffer_contents(Utf8Path::new("a.js")).await.unwrap(), Some("hello".to_string()));

    use otsync_collab::OtArg;
    use otsync_collab::OtOp;
    doc.push_remote_text_op(OtOp::Indexed(5, OtArg::Insert(" world".to_string())), None);

    let mut spins = 0;
    loop {
        if h.editor.open_buffer_contents(Utf8Path::new("a.js")).await.unwrap() == Some("hello world".to_string()) {
            break;
        }
        spins += 1;
        assert!(spins < 100_000, "open buffer was never updated with the remote op");
        tokio::task::yield_now().await;
    }

    let mut spins = 0;
    loop {
        let on_disk = tokio::fs::read_to_string(h.editor.root().path().join("a.js")).await.unwrap();
        if on_disk == "hello world" {
            break;
        }
        spins += 1;
        assert!(spins < 100_000, "disk content was never updated with the remote op");
        tokio::task::yield_now().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn local_delete_then_create_pair_coalesces_into_a_rename_round_trip() {
    let h = harness();

    let hash = format!("{:x}", md5::compute("content"));
    let file = file_asset(30, 30, "old.js", vec![], &hash);
    h.realtime.insert(Collection::Assets, file.unique_id, serde_json::to_value(&file).unwrap());
    h.realtime.insert(Collection::Documents, file.unique_id, serde_json::json!({"data": "content"}));

    h.project.link("proj-1".to_string(), "main".to_string()).await.unwrap();
    h.mirror.link(Arc::clone(&h.project), None).await.unwrap();
    assert_eq!(
        tokio::fs::read_to_string(h.editor.root().path().join("old.js")).await.unwrap(),
        "content"
    );

    h.editor.push_fs_event(FsEvent::Deleted(Utf8PathBuf::from("old.js")));
    h.editor.push_fs_event(FsEvent::Created(Utf8PathBuf::from("new.js")));

    until(|| !h.rest.renamed_assets().is_empty()).await;
    let (renamed_id, new_name) = h.rest.renamed_assets().into_iter().next().unwrap();
    assert_eq!(renamed_id, file.unique_id);
    assert_eq!(new_name, "new.js");

    let doc = h.realtime.get(Collection::Assets, file.unique_id).expect("asset doc seeded above");
    doc.push_remote_op(serde_json::json!({"p": ["name"], "oi": "new.js", "od": "old.js"}), None);

    until(|| h.project.path(file.unique_id) == Some("new.js".to_string())).await;
    until(|| h.editor.root().path().join("new.js").exists()).await;
    assert!(!h.editor.root().path().join("old.js").exists());
}

/// §4.2 step 4, S5: a nested `a` → `a/b` → `a/b/c.js` disk creation is
/// dispatched strictly parent-before-child. `a/b`'s REST call must not go
/// out until `a`'s has been acknowledged (and placed in the model), and
/// likewise for `a/b/c.js` against `a/b` — proving the dependency
/// scheduler's slots are claimed before any task runs, not merely before
/// it finishes.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn nested_creation_dispatches_strictly_parent_before_child() {
    let h = harness();
    h.project.link("proj-1".to_string(), "main".to_string()).await.unwrap();
    h.mirror.link(Arc::clone(&h.project), None).await.unwrap();

    let root = h.editor.root().path();
    tokio::fs::create_dir_all(root.join("a/b")).await.unwrap();
    tokio::fs::write(root.join("a/b/c.js"), "hi").await.unwrap();

    h.editor.push_fs_event(FsEvent::Created(Utf8PathBuf::from("a")));
    h.editor.push_fs_event(FsEvent::Created(Utf8PathBuf::from("a/b")));
    h.editor.push_fs_event(FsEvent::Created(Utf8PathBuf::from("a/b/c.js")));

    until(|| !h.rest.created_assets().is_empty()).await;
    assert_eq!(h.rest.created_assets().len(), 1, "a/b must wait for a's reservation before dispatching");
    let a_req = h.rest.created_assets().into_iter().next().unwrap();
    assert_eq!(a_req.name, "a");

    h.realtime.insert(Collection::Assets, a_req.unique_id, serde_json::to_value(&a_req).unwrap());
    h.messenger.push_event(MessengerEvent::AssetNew {
        unique_id: a_req.unique_id,
        item_id: a_req.item_id,
        name: a_req.name.clone(),
        kind: a_req.kind,
        branch_id: a_req.branch_id.clone(),
    });

    until(|| h.rest.created_assets().len() >= 2).await;
    assert_eq!(h.rest.created_assets().len(), 2, "a/b/c.js must wait for a/b's reservation before dispatching");
    let b_req = h.rest.created_assets()[1].clone();
    assert_eq!(b_req.name, "b");
    assert_eq!(b_req.path, vec![a_req.item_id]);

    h.realtime.insert(Collection::Assets, b_req.unique_id, serde_json::to_value(&b_req).unwrap());
    h.messenger.push_event(MessengerEvent::AssetNew {
        unique_id: b_req.unique_id,
        item_id: b_req.item_id,
        name: b_req.name.clone(),
        kind: b_req.kind,
        branch_id: b_req.branch_id.clone(),
    });

    until(|| h.rest.created_assets().len() >= 3).await;
    let c_req = h.rest.created_assets()[2].clone();
    assert_eq!(c_req.name, "c.js");
    assert_eq!(c_req.path, vec![b_req.item_id]);
}
