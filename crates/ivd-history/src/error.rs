use std::path::PathBuf;

/// Errors from position catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// No history entry matches the request.
    #[error("no history entry: {0}")]
    NoEntry(String),

    /// An alias name is empty or collides with nothing resolvable.
    #[error("invalid alias: {0}")]
    InvalidAlias(String),

    /// Filesystem failure.
    #[error("history I/O error during {op} at {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The catalog file failed to serialize or deserialize.
    #[error("history state error: {0}")]
    State(String),
}

impl HistoryError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Result alias for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;
