use std::path::PathBuf;

/// Errors from checkout and stash operations.
#[derive(Debug, thiserror::Error)]
pub enum WorktreeError {
    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] ivd_store::StoreError),

    /// Object payload failed to decode.
    #[error(transparent)]
    Object(#[from] ivd_objects::ObjectError),

    /// The checkout was cancelled before any file was replaced.
    #[error("checkout cancelled")]
    Cancelled,

    /// Filesystem failure.
    #[error("worktree I/O error during {op} at {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WorktreeError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Result alias for worktree operations.
pub type WorktreeResult<T> = Result<T, WorktreeError>;
