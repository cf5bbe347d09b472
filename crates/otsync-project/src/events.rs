use otsync_collab::AssetKind;
use otsync_collab::ItemId;
use otsync_collab::OtOp;
use otsync_collab::UniqueId;

/// Everything the rest of the core (notably `otsync-mirror`'s
/// `DiskMirror`) learns about a model mutation, whether it originated
/// remotely or locally. Broadcast on a single `tokio::sync::broadcast`
/// channel per §4.1's **[ADD] Event bus** note — `link`'s per-asset await
/// and `wait_for_file` are filtered `recv()` loops over a subscription to
/// this same bus, not bespoke oneshot wiring per call site.
#[derive(Clone, Debug)]
pub enum ProjectEvent {
    AssetCreate { unique_id: UniqueId, path: String, kind: AssetKind },
    AssetUpdate { unique_id: UniqueId, field: AssetField, path: String },
    AssetDelete { unique_id: UniqueId, path: String },
    FileUpdate { path: String, op: OtOp, new_content: String },
    FileSave { path: String },
    FileDelete { path: String },
    FileRename { from: String, to: String },
    Collision { path: String, item_id: ItemId },
}

/// Which top-level asset field an `asset:update` mutated, driving the
/// reaction dispatch in §4.1's "Asset:update reactions".
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AssetField {
    Name,
    Path,
    File,
    Other,
}

impl AssetField {
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        match key {
            "name" => Self::Name,
            "path" => Self::Path,
            "file" => Self::File,
            _ => Self::Other,
        }
    }
}

/// Capacity of the broadcast channel backing [`ProjectEvent`] delivery.
/// Generous enough that a burst of remote ops during `link`'s bulk asset
/// load never lags a subscriber under normal test/production load; a
/// subscriber that falls behind sees `RecvError::Lagged` rather than
/// blocking the sender, matching `tokio::sync::broadcast`'s contract.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;
