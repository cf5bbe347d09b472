use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::ids::UniqueId;
use crate::otop::OtArg;
use crate::otop::OtOp;
use crate::traits::DocEvent;
use crate::traits::DocEventStream;
use crate::traits::DocHandle;

/// Which op algebra a fake doc's snapshot is edited with. A real ShareDB
/// server picks this per collection (`documents` uses the `ot-text`-style
/// ops `otsync_collab::OtOp` models, `assets` uses `json0`); the fake needs
/// to know it too so [`FakeDocHandle::push_remote_op`] and
/// [`DocHandle::submit_op`] can maintain a snapshot that actually reflects
/// what was pushed, instead of just rebroadcasting the raw op untouched.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum DocKind {
    /// `documents` collection: snapshot is `{"data": "<text>"}`, ops are
    /// `OtOp`'s wire arrays.
    Text,
    /// `assets` collection: snapshot is the serialized `Asset`, ops are
    /// json0 object components (`{p, oi?, od?, li?, ld?}`).
    Json,
}

/// Applies an [`OtOp`] to the `data` string field of a ShareDB-style
/// document snapshot, the way the real server would. Used only by the
/// fakes: `otsync-codec` owns the canonical version of this logic for the
/// editor-facing direction.
fn apply_to_data(snapshot: &mut Value, op: &OtOp) {
    let Some(data) = snapshot.get_mut("data").and_then(|v| v.as_str().map(str::to_owned)) else {
        return;
    };
    let mut chars: Vec<char> = data.chars().collect();
    let (index, arg) = match op {
        OtOp::Arg(arg) => (0, arg),
        OtOp::Indexed(index, arg) => (*index, arg),
        OtOp::Replace(index, ins, del) => {
            let end = (*index + del).min(chars.len());
            chars.splice(*index..end, ins.chars());
            snapshot["data"] = Value::String(chars.into_iter().collect());
            return;
        }
    };
    match arg {
        OtArg::Insert(s) => {
            let at = index.min(chars.len());
            chars.splice(at..at, s.chars());
        }
        OtArg::Delete(n) => {
            let end = (index + n).min(chars.len());
            let start = (*index).min(end);
            chars.drain(start..end);
        }
    }
    snapshot["data"] = Value::String(chars.into_iter().collect());
}

/// Applies a json0-style op component directly to an asset doc's snapshot.
/// A stripped-down reimplementation of `otsync_project::asset_op::apply`
/// kept local to the fake: the fake plays the role of the server
/// maintaining its own source-of-truth snapshot, same as `apply_to_data`
/// above does for text docs, and that role has no business depending on
/// the consuming crate's op-application module.
fn apply_json0(snapshot: &mut Value, op: &Value) {
    let Some(path) = op.get("p").and_then(Value::as_array) else { return };
    if path.is_empty() {
        return;
    }
    let (last, ancestors) = path.split_last().expect("checked non-empty above");

    let mut current = snapshot;
    for segment in ancestors {
        current = match segment.as_str() {
            Some(key) => {
                if current.is_null() {
                    *current = Value::Object(Map::new());
                }
                let Some(obj) = current.as_object_mut() else { return };
                obj.entry(key.to_string()).or_insert(Value::Null)
            }
            None => {
                let Some(index) = segment.as_u64().map(|n| n as usize) else { return };
                let Some(arr) = current.as_array_mut() else { return };
                let Some(slot) = arr.get_mut(index) else { return };
                slot
            }
        };
    }

    if let Some(key) = last.as_str() {
        let Some(obj) = current.as_object_mut() else { return };
        if let Some(value) = op.get("oi") {
            obj.insert(key.to_string(), value.clone());
        } else if op.get("od").is_some() {
            obj.remove(key);
        }
    } else if let Some(index) = last.as_u64().map(|n| n as usize) {
        let Some(arr) = current.as_array_mut() else { return };
        match (op.get("li"), op.get("ld")) {
            (Some(value), Some(_)) => {
                if let Some(slot) = arr.get_mut(index) {
                    *slot = value.clone();
                }
            }
            (Some(value), None) => arr.insert(index.min(arr.len()), value.clone()),
            (None, Some(_)) if index < arr.len() => {
                arr.remove(index);
            }
            _ => {}
        }
    }
}

fn apply(kind: DocKind, snapshot: &mut Value, op: &Value) {
    match kind {
        DocKind::Text => {
            if let Ok(ot) = OtOp::from_json(op) {
                apply_to_data(snapshot, &ot);
            }
        }
        DocKind::Json => apply_json0(snapshot, op),
    }
}

/// In-memory stand-in for a live ShareDB document, backing every fake
/// [`RealtimeClient`](crate::RealtimeClient) doc.
pub struct FakeDocHandle {
    unique_id: UniqueId,
    kind: DocKind,
    snapshot: Mutex<Value>,
    sender: broadcast::Sender<DocEvent>,
    submitted: Mutex<Vec<(Value, String)>>,
}

impl FakeDocHandle {
    #[must_use]
    pub fn new(unique_id: UniqueId, kind: DocKind, snapshot: Value) -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { unique_id, kind, snapshot: Mutex::new(snapshot), sender, submitted: Mutex::new(Vec::new()) }
    }

    /// Simulate a text op arriving from another client (`documents`
    /// collection docs only).
    pub fn push_remote_text_op(&self, op: OtOp, source: Option<String>) {
        self.push_remote_op(op.to_json(), source);
    }

    /// Simulate a remote op arriving from another client, applying it to
    /// the tracked snapshot and broadcasting it to subscribers.
    pub fn push_remote_op(&self, op: Value, source: Option<String>) {
        {
            let mut snapshot = self.snapshot.lock().expect("snapshot mutex poisoned");
            apply(self.kind, &mut snapshot, &op);
        }
        let _ = self.sender.send(DocEvent::Op { op, source });
    }

    pub fn push_deleted(&self) {
        let _ = self.sender.send(DocEvent::Deleted);
    }

    /// Every op submitted through [`DocHandle::submit_op`], in order, with
    /// the source tag each was submitted under. Lets a test assert the
    /// core emitted exactly the ops it expected under `LOCAL_OT_SOURCE`.
    #[must_use]
    pub fn submitted_ops(&self) -> Vec<(Value, String)> {
        self.submitted.lock().expect("submitted mutex poisoned").clone()
    }
}

#[async_trait]
impl DocHandle for FakeDocHandle {
    fn unique_id(&self) -> UniqueId {
        self.unique_id
    }

    fn snapshot(&self) -> Value {
        self.snapshot.lock().expect("snapshot mutex poisoned").clone()
    }

    fn events(&self) -> DocEventStream {
        let stream = BroadcastStream::new(self.sender.subscribe()).filter_map(Result::ok);
        Box::pin(stream)
    }

    async fn submit_op(&self, op: Value, source: &str) -> anyhow::Result<()> {
        {
            let mut snapshot = self.snapshot.lock().expect("snapshot mutex poisoned");
            apply(self.kind, &mut snapshot, &op);
        }
        self.submitted.lock().expect("submitted mutex poisoned").push((op.clone(), source.to_string()));
        let _ = self.sender.send(DocEvent::Op { op, source: Some(source.to_string()) });
        Ok(())
    }
}
