//! `DiskMirror`: the bijection between a `VirtualProject` and a workspace
//! directory (§4.2).
//!
//! Binds `otsync-project`'s model to an `otsync-collab::EditorHost`:
//! model events are replayed onto disk and open editor documents, and
//! local disk/editor events are replayed onto the model, with the echo
//! set, per-path mutex, and dependency scheduler keeping the two
//! directions from looping into each other.

mod coalesce;
mod echo;
mod error;
mod ignore_rules;
mod mirror;
mod path_mutex;
mod scheduler;

pub use coalesce::DeferOp;
pub use coalesce::ResolvedOp;
pub use echo::EchoSet;
pub use error::MirrorError;
pub use error::MirrorResult;
pub use ignore_rules::IgnoreRules;
pub use mirror::DiskMirror;
pub use path_mutex::PathMutex;
pub use scheduler::DependencyScheduler;
