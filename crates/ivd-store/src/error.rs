use std::path::PathBuf;

use ivd_types::Hash;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(Hash),

    /// The zero hash never names a stored object.
    #[error("the zero hash is reserved and cannot be stored or fetched")]
    ZeroHash,

    /// I/O failure; carries the operation and path for remediation.
    #[error("storage error during {op} at {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Content hash mismatch on verify (data corruption).
    #[error("hash mismatch for {expected}: content hashes to {computed}")]
    HashMismatch { expected: Hash, computed: Hash },

    /// The object file is malformed (empty, or unknown kind byte).
    #[error("corrupt object {hash}: {reason}")]
    Corrupt { hash: Hash, reason: String },

    /// A sweep was cancelled partway; already-removed objects stay gone.
    #[error("store sweep cancelled")]
    Cancelled,
}

impl StoreError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
