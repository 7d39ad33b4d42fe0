use std::path::PathBuf;

/// Errors from timeline operations.
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    /// The timeline name failed validation.
    #[error(transparent)]
    Invalid(#[from] ivd_types::TypeError),

    /// No timeline with this name exists.
    #[error("timeline not found: {0:?}")]
    NotFound(String),

    /// A timeline with this name already exists.
    #[error("timeline already exists: {0:?}")]
    AlreadyExists(String),

    /// `main` can never be deleted.
    #[error("the main timeline cannot be deleted")]
    CannotDeleteMain,

    /// The current timeline cannot be deleted; switch away first.
    #[error("cannot delete the current timeline {0:?} -- switch to another timeline first")]
    CannotDeleteCurrent(String),

    /// A WAL phase transition went backwards.
    #[error("switch journal phase cannot move from {from:?} to {to:?}")]
    PhaseRegression { from: String, to: String },

    /// Filesystem failure.
    #[error("timeline I/O error during {op} at {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A state file failed to serialize or deserialize.
    #[error("timeline state error: {0}")]
    State(String),
}

impl TimelineError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Result alias for timeline operations.
pub type TimelineResult<T> = Result<T, TimelineError>;
