//! Exercises `VirtualProject` end to end against the `otsync-collab` fakes:
//! linking, creation, deletion, renaming, collisions, and content writes.

use std::sync::Arc;

use otsync_collab::fake::FakeAlertSink;
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
use otsync_collab::ItemId;
use otsync_collab::ManualClock;
use otsync_collab::Messenger;
use otsync_collab::MessengerEvent;
use otsync_collab::OtArg;
use otsync_collab::OtOp;
use otsync_collab::RealtimeClient;
use otsync_collab::RestClient;
use otsync_collab::UniqueId;
use otsync_collab::LOCAL_OT_SOURCE;
use otsync_project::CreateKind;
use otsync_project::VirtualProject;

struct Harness {
    project: Arc<VirtualProject>,
    realtime: Arc<FakeRealtimeClient>,
    rest: Arc<FakeRestClient>,
    messenger: Arc<FakeMessenger>,
    alerts: Arc<FakeAlertSink>,
}

fn harness() -> Harness {
    let _ = tracing_subscriber::fmt::try_init();
    let realtime = Arc::new(FakeRealtimeClient::new());
    let rest = Arc::new(FakeRestClient::new());
    let messenger = Arc::new(FakeMessenger::new());
    let alerts = Arc::new(FakeAlertSink::new());
    let clock = Arc::new(ManualClock::new());
    let project = VirtualProject::new(
        Arc::clone(&realtime) as Arc<dyn RealtimeClient>,
        Arc::clone(&rest) as Arc<dyn RestClient>,
        Arc::clone(&messenger) as Arc<dyn Messenger>,
        Arc::clone(&alerts) as Arc<dyn AlertSink>,
        clock as Arc<dyn Clock>,
        Config::default(),
    );
    Harness { project, realtime, rest, messenger, alerts }
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

async fn until<F: Fn() -> bool>(predicate: F) {
    while !predicate() {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn link_places_root_folders_before_nested_files() {
    let h = harness();

    let src = folder_asset(1, 1, "src", vec![]);
    let hash = format!("{:x}", md5::compute("hello"));
    let file = file_asset(2, 2, "a.js", vec![ItemId::new(1)], &hash);

    h.realtime.insert(Collection::Assets, src.unique_id, serde_json::to_value(&src).unwrap());
    h.realtime.insert(Collection::Assets, file.unique_id, serde_json::to_value(&file).unwrap());
    h.realtime.insert(Collection::Documents, file.unique_id, serde_json::json!({"data": "hello"}));

    let snapshot = h.project.link("proj-1".to_string(), "main".to_string()).await.unwrap();

    assert_eq!(snapshot.unique_id_of("src"), Some(src.unique_id));
    assert_eq!(snapshot.is_folder("src"), Some(true));
    assert_eq!(snapshot.unique_id_of("src/a.js"), Some(file.unique_id));
    assert_eq!(snapshot.is_folder("src/a.js"), Some(false));
    assert_eq!(snapshot.file_count(), 3); // root, src, src/a.js
    assert!(h.alerts.messages().is_empty());
}

#[tokio::test]
async fn create_resolves_once_the_new_asset_is_announced() {
    let h = harness();
    h.project.link("proj-1".to_string(), "main".to_string()).await.unwrap();

    let project = Arc::clone(&h.project);
    let create_task =
        tokio::spawn(async move { project.create("readme.txt", CreateKind::File, Some("hi".to_string())).await });

    until(|| !h.rest.created_assets().is_empty()).await;
    let asset = h.rest.created_assets().into_iter().next().expect("create_asset was called");

    h.realtime.insert(Collection::Assets, asset.unique_id, serde_json::to_value(&asset).unwrap());
    h.realtime.insert(Collection::Documents, asset.unique_id, serde_json::json!({"data": "hi"}));
    h.messenger.push_event(MessengerEvent::AssetNew {
        unique_id: asset.unique_id,
        item_id: asset.item_id,
        name: asset.name.clone(),
        kind: asset.kind,
        branch_id: asset.branch_id.clone(),
    });

    let unique_id = create_task.await.unwrap().unwrap();
    assert_eq!(unique_id, asset.unique_id);
    assert_eq!(h.project.path(unique_id), Some("readme.txt".to_string()));
}

#[tokio::test]
async fn delete_resolves_once_the_asset_is_removed() {
    let h = harness();

    let hash = format!("{:x}", md5::compute("old"));
    let file = file_asset(5, 5, "old.js", vec![], &hash);
    h.realtime.insert(Collection::Assets, file.unique_id, serde_json::to_value(&file).unwrap());
    h.realtime.insert(Collection::Documents, file.unique_id, serde_json::json!({"data": "old"}));
    h.project.link("proj-1".to_string(), "main".to_string()).await.unwrap();
    assert_eq!(h.project.path(file.unique_id), Some("old.js".to_string()));

    let project = Arc::clone(&h.project);
    let delete_task = tokio::spawn(async move { project.delete("old.js", false).await });

    until(|| !h.rest.deleted_ids().is_empty()).await;
    let doc = h.realtime.get(Collection::Assets, file.unique_id).expect("asset doc seeded above");
    doc.push_deleted();

    delete_task.await.unwrap().unwrap();
    assert_eq!(h.project.path(file.unique_id), None);
}

#[tokio::test]
async fn same_parent_rename_resolves_once_the_server_applies_it() {
    let h = harness();

    let hash = format!("{:x}", md5::compute(""));
    let file = file_asset(8, 8, "old.js", vec![], &hash);
    h.realtime.insert(Collection::Assets, file.unique_id, serde_json::to_value(&file).unwrap());
    h.realtime.insert(Collection::Documents, file.unique_id, serde_json::json!({"data": ""}));
    h.project.link("proj-1".to_string(), "main".to_string()).await.unwrap();

    let project = Arc::clone(&h.project);
    let rename_task = tokio::spawn(async move { project.rename("old.js", "new.js").await });

    until(|| !h.rest.renamed_assets().is_empty()).await;
    let doc = h.realtime.get(Collection::Assets, file.unique_id).expect("asset doc seeded above");
    doc.push_remote_op(serde_json::json!({"p": ["name"], "oi": "new.js", "od": "old.js"}), None);

    rename_task.await.unwrap().unwrap();
    assert_eq!(h.project.path(file.unique_id), Some("new.js".to_string()));
}

#[tokio::test]
async fn cross_parent_rename_goes_through_move_asset() {
    let h = harness();

    let dest = folder_asset(20, 20, "lib", vec![]);
    let hash = format!("{:x}", md5::compute(""));
    let file = file_asset(21, 21, "old.js", vec![], &hash);
    h.realtime.insert(Collection::Assets, dest.unique_id, serde_json::to_value(&dest).unwrap());
    h.realtime.insert(Collection::Assets, file.unique_id, serde_json::to_value(&file).unwrap());
    h.realtime.insert(Collection::Documents, file.unique_id, serde_json::json!({"data": ""}));
    h.project.link("proj-1".to_string(), "main".to_string()).await.unwrap();

    let project = Arc::clone(&h.project);
    let rename_task = tokio::spawn(async move { project.rename("old.js", "lib/old.js").await });

    until(|| !h.realtime.moves().is_empty()).await;
    assert_eq!(h.realtime.moves(), vec![(file.unique_id, Some(dest.unique_id))]);

    let doc = h.realtime.get(Collection::Assets, file.unique_id).expect("asset doc seeded above");
    doc.push_remote_op(serde_json::json!({"p": ["path"], "oi": [20], "od": []}), None);

    rename_task.await.unwrap().unwrap();
    assert_eq!(h.project.path(file.unique_id), Some("lib/old.js".to_string()));
}

#[tokio::test]
async fn write_replaces_content_with_a_full_delete_then_insert() {
    let h = harness();

    let hash = format!("{:x}", md5::compute("AXC"));
    let file = file_asset(9, 9, "a.js", vec![], &hash);
    h.realtime.insert(Collection::Assets, file.unique_id, serde_json::to_value(&file).unwrap());
    let doc = h.realtime.insert(Collection::Documents, file.unique_id, serde_json::json!({"data": "AXC"}));
    h.project.link("proj-1".to_string(), "main".to_string()).await.unwrap();

    h.project.write("a.js", "hello world").await.unwrap();

    let ops = doc.submitted_ops();
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0].0, OtOp::Indexed(0, OtArg::Delete(3)).to_json());
    assert_eq!(ops[1].0, OtOp::Indexed(0, OtArg::Insert("hello world".to_string())).to_json());
    assert_eq!(ops[0].1, LOCAL_OT_SOURCE);
    assert_eq!(doc.snapshot()["data"], "hello world");
}

#[tokio::test]
async fn link_marks_colliding_assets_and_alerts() {
    let h = harness();

    let first = file_asset(10, 10, "a.js", vec![], &format!("{:x}", md5::compute("x")));
    let second = file_asset(11, 11, "a.js", vec![], &format!("{:x}", md5::compute("y")));
    h.realtime.insert(Collection::Assets, first.unique_id, serde_json::to_value(&first).unwrap());
    h.realtime.insert(Collection::Assets, second.unique_id, serde_json::to_value(&second).unwrap());
    h.realtime.insert(Collection::Documents, first.unique_id, serde_json::json!({"data": "x"}));
    h.realtime.insert(Collection::Documents, second.unique_id, serde_json::json!({"data": "y"}));

    let snapshot = h.project.link("proj-1".to_string(), "main".to_string()).await.unwrap();

    assert_eq!(snapshot.collisions().len(), 1);
    assert!(!h.alerts.messages().is_empty());
}

#[tokio::test]
async fn wait_for_file_resolves_once_the_asset_is_placed() {
    let h = harness();
    h.project.link("proj-1".to_string(), "main".to_string()).await.unwrap();

    let project = Arc::clone(&h.project);
    let wait_task = tokio::spawn(async move { project.wait_for_file("new.js").await });
    tokio::task::yield_now().await;

    let asset = file_asset(12, 12, "new.js", vec![], &format!("{:x}", md5::compute("")));
    h.realtime.insert(Collection::Assets, asset.unique_id, serde_json::to_value(&asset).unwrap());
    h.realtime.insert(Collection::Documents, asset.unique_id, serde_json::json!({"data": ""}));
    h.messenger.push_event(MessengerEvent::AssetNew {
        unique_id: asset.unique_id,
        item_id: asset.item_id,
        name: asset.name.clone(),
        kind: asset.kind,
        branch_id: asset.branch_id.clone(),
    });

    let unique_id = wait_task.await.unwrap().unwrap();
    assert_eq!(unique_id, asset.unique_id);
}
