use std::path::PathBuf;

use ivd_types::Hash;

/// Errors surfaced by the repository facade.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// The directory is not an Ivaldi repository.
    #[error("not an Ivaldi repository: {0} (run forge first)")]
    NotARepository(PathBuf),

    /// The directory is already a repository.
    #[error("already an Ivaldi repository: {0}")]
    AlreadyForged(PathBuf),

    /// A head or history entry references an object the store does not
    /// have. Fatal: run verify/GC recovery.
    #[error("internal consistency violation: {context} references missing object {hash}")]
    MissingObject { hash: Hash, context: String },

    /// WAL recovery could not complete; the repository needs manual
    /// intervention.
    #[error("switch journal recovery failed: {0}")]
    WalRecoveryFailed(String),

    /// No shelf with this name exists.
    #[error("shelf not found: {0:?}")]
    ShelfNotFound(String),

    /// A shelf with this name already exists.
    #[error("shelf already exists: {0:?}")]
    ShelfAlreadyExists(String),

    /// Nothing to amend on a timeline with no seals.
    #[error("timeline has no seal to amend")]
    NothingToAmend,

    #[error(transparent)]
    Invalid(#[from] ivd_types::TypeError),

    #[error(transparent)]
    Object(#[from] ivd_objects::ObjectError),

    #[error(transparent)]
    Store(#[from] ivd_store::StoreError),

    #[error(transparent)]
    Workspace(#[from] ivd_workspace::WorkspaceError),

    #[error(transparent)]
    Worktree(#[from] ivd_worktree::WorktreeError),

    #[error(transparent)]
    Timeline(#[from] ivd_timeline::TimelineError),

    #[error(transparent)]
    History(#[from] ivd_history::HistoryError),

    #[error(transparent)]
    Overwrite(#[from] ivd_overwrite::OverwriteError),

    #[error(transparent)]
    Resolve(#[from] ivd_resolve::ResolveError),

    /// Filesystem failure outside the subsystems.
    #[error("repository I/O error during {op} at {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A state file failed to serialize or deserialize.
    #[error("repository state error: {0}")]
    State(String),
}

impl RepoError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if this error means the anvil was empty at seal time.
    pub fn is_nothing_gathered(&self) -> bool {
        matches!(
            self,
            Self::Workspace(ivd_workspace::WorkspaceError::NothingGathered)
        )
    }
}

/// Result alias for repository operations.
pub type RepoResult<T> = Result<T, RepoError>;
