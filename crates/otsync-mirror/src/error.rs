use camino::Utf8PathBuf;

/// `DiskMirror`'s seam-level error type (§7's "[ADD] Rust shape" —
/// one `thiserror` enum per crate, matching `otsync_project::ProjectError`).
#[derive(thiserror::Error, Debug)]
pub enum MirrorError {
    #[error("disk mirror is already linked")]
    AlreadyLinked,
    #[error("disk mirror is not linked")]
    NotLinked,
    #[error("parent directory for {path} does not exist on disk")]
    MissingParentDir { path: Utf8PathBuf },
    #[error("project operation failed: {0}")]
    Project(#[from] otsync_project::ProjectError),
    #[error("editor host operation failed: {0}")]
    Host(#[source] anyhow::Error),
}

pub type MirrorResult<T> = Result<T, MirrorError>;
