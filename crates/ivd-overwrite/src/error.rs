use std::path::PathBuf;

use ivd_types::Hash;

/// Errors from overwrite log operations.
#[derive(Debug, thiserror::Error)]
pub enum OverwriteError {
    /// Every overwrite must say why.
    #[error("overwrite requires a non-empty justification")]
    EmptyJustification,

    /// The original seal is protected from rewrites.
    #[error("seal {0} is protected and cannot be overwritten")]
    ProtectedSeal(Hash),

    /// Filesystem failure.
    #[error("overwrite log I/O error during {op} at {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The log file failed to serialize or deserialize.
    #[error("overwrite log state error: {0}")]
    State(String),
}

impl OverwriteError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Result alias for overwrite operations.
pub type OverwriteResult<T> = Result<T, OverwriteError>;
