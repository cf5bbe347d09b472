//! `VirtualProject`: the in-memory model of a remote OT project.
//!
//! Owns the `path -> VirtualFile` mapping, the asset metadata table, and
//! the `itemId <-> uniqueId` bimap, and mediates every state change with
//! the collaborators defined in `otsync-collab` (realtime client, REST
//! client, messenger, alert sink). `otsync-mirror`'s `DiskMirror` is the
//! only other crate that reads this model directly; everything else
//! observes it through [`events::ProjectEvent`] broadcasts.

mod asset_op;
mod bimap;
mod collisions;
mod error;
mod events;
mod file;
mod path;
mod project;
mod snapshot;

pub use error::ProjectError;
pub use error::ProjectResult;
pub use events::AssetField;
pub use events::ProjectEvent;
pub use file::VirtualFile;
pub use project::CreateKind;
pub use project::VirtualProject;
pub use snapshot::ProjectSnapshot;
