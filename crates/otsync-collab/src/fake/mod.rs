//! In-memory implementations of every trait in [`crate::traits`], gated
//! behind the `fake` feature so they never end up in a production binary's
//! dependency graph. Every integration test in `otsync-project` and
//! `otsync-mirror` is built on these.

mod alerts;
mod doc;
mod editor;
mod messenger;
mod realtime;
mod rest;

pub use alerts::FakeAlertSink;
pub use doc::DocKind;
pub use doc::FakeDocHandle;
pub use editor::FakeEditorHost;
pub use messenger::FakeMessenger;
pub use realtime::FakeRealtimeClient;
pub use rest::FakeRestClient;
