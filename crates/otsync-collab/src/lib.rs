//! Trait contracts for the sync core's external collaborators.
//!
//! This crate carries no synchronization logic of its own. It defines the
//! seams `otsync-project`'s `VirtualProject` and `otsync-mirror`'s
//! `DiskMirror` are built against: the realtime document service, the
//! REST asset API, the presence messenger, and the editor host's
//! filesystem/document surface. It also owns the
//! small set of wire-shaped value types (`Asset`, `OtOp`, `TextEdit`, …)
//! those seams pass back and forth, since more than one downstream crate
//! needs them and neither owns the other.
//!
//! Enable the `fake` feature to pull in in-memory implementations of every
//! trait here, used by `otsync-project` and `otsync-mirror`'s test suites.

mod asset;
mod clock;
mod config;
mod events;
mod ids;
mod otop;
mod text_edit;
mod traits;

pub use asset::Asset;
pub use asset::AssetFile;
pub use asset::AssetKind;
pub use asset::Branch;
pub use clock::Clock;
pub use clock::ManualClock;
pub use clock::TokioClock;
pub use config::Config;
pub use events::Collection;
pub use events::DocSaveEvent;
pub use events::DocSaveState;
pub use events::DocumentEvent;
pub use events::FileStat;
pub use events::FsEvent;
pub use events::MessengerEvent;
pub use events::RawTextChange;
pub use ids::ItemId;
pub use ids::UniqueId;
pub use otop::OtArg;
pub use otop::OtOp;
pub use otop::OtOpError;
pub use text_edit::Position;
pub use text_edit::Range;
pub use text_edit::TextEdit;
pub use traits::AlertSink;
pub use traits::AssetCreateRequest;
pub use traits::DocEvent;
pub use traits::DocEventStream;
pub use traits::DocHandle;
pub use traits::EditorHost;
pub use traits::Messenger;
pub use traits::RealtimeClient;
pub use traits::RestClient;

/// The reserved `submitOp` source token the core uses to mark its own
/// writes, so the remote-op handlers can tell local echoes from genuine
/// remote edits. Shared verbatim between `otsync-project` and
/// `otsync-mirror`.
pub const LOCAL_OT_SOURCE: &str = "otsync-local";

#[cfg(feature = "fake")]
pub mod fake;
