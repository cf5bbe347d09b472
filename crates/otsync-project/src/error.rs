use thiserror::Error;

use otsync_collab::ItemId;
use otsync_collab::UniqueId;

/// Fatal, per-project and recoverable, per-operation errors raised by
/// [`crate::VirtualProject`] (§7's taxonomy). Silent and user-visible
/// conditions are not represented here — they are logged or routed to an
/// [`otsync_collab::AlertSink`] instead, never surfaced as a `Result`.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("project is already linked")]
    ProjectAlreadyLinked,

    #[error("project is not linked")]
    ProjectNotLinked,

    #[error("REST token does not have the required scope")]
    InvalidTokenScope,

    #[error("failed to subscribe to realtime collections: {0}")]
    SubscribeFailed(#[source] anyhow::Error),

    #[error("parent folder for {path:?} does not exist")]
    MissingParent { path: String },

    #[error("{name:?} is not a valid asset name")]
    InvalidName { name: String },

    #[error("no file at path {path:?}")]
    FileNotFound { path: String },

    #[error("a file already exists at path {path:?}")]
    FileExists { path: String },

    #[error("destination folder for rename not found")]
    DestFolderNotFound,

    #[error("cannot rename the root folder")]
    CannotMoveRoot,

    #[error("asset {unique_id} references unknown ancestor item id {item_id}")]
    MissingAssetMapping { unique_id: UniqueId, item_id: ItemId },

    #[error(transparent)]
    Rest(#[from] anyhow::Error),
}

pub type ProjectResult<T> = Result<T, ProjectError>;
