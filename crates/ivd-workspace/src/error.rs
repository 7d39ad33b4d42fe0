use std::path::PathBuf;

/// Errors from workspace operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// A path or pattern failed boundary validation.
    #[error(transparent)]
    Invalid(#[from] ivd_types::TypeError),

    /// A gather/discard pattern matched nothing.
    #[error("pattern matched no tracked files: {0:?}")]
    NoMatch(String),

    /// A gather/discard pattern is not a valid glob.
    #[error("invalid pattern {pattern:?}: {reason}")]
    Pattern { pattern: String, reason: String },

    /// Candidate tree requested while the anvil is empty.
    #[error("nothing gathered: the anvil is empty -- run gather first")]
    NothingGathered,

    /// The operation was cancelled before completing.
    #[error("scan cancelled")]
    Cancelled,

    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] ivd_store::StoreError),

    /// Object encoding failed.
    #[error(transparent)]
    Object(#[from] ivd_objects::ObjectError),

    /// Filesystem failure outside the store.
    #[error("workspace I/O error during {op} at {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// State file failed to serialize or deserialize.
    #[error("workspace state error: {0}")]
    State(String),
}

impl WorkspaceError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Result alias for workspace operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;
