//! Validation error types shared across the Ivaldi boundary.

/// Errors from parsing and validating boundary inputs.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TypeError {
    /// A hash string could not be parsed.
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    /// A timeline name violates the naming rules.
    #[error("invalid timeline name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A seal message violates the message rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A workspace path is absolute, escapes the root, or is malformed.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// An identity field is empty or exceeds the encodable length.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),
}

/// Result alias for validation operations.
pub type TypeResult<T> = Result<T, TypeError>;
