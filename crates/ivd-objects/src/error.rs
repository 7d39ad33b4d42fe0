//! Error types for object encoding and decoding.

/// Errors from encoding or decoding object payloads.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ObjectError {
    /// The payload is malformed. Carries the byte offset of the failure.
    #[error("decode error at offset {offset}: {reason}")]
    Decode { offset: usize, reason: String },

    /// A tree entry has an empty name.
    #[error("tree entry name must not be empty")]
    EmptyEntryName,

    /// Two tree entries share a name.
    #[error("duplicate tree entry name: {0:?}")]
    DuplicateEntry(String),

    /// An entry name does not fit the u16 length prefix.
    #[error("tree entry name too long: {0} bytes")]
    NameTooLong(usize),

    /// An identity field does not fit the u16 length prefix.
    #[error("identity field too long: {0} bytes")]
    IdentityTooLong(usize),

    /// A seal has more parents than the u16 count field allows.
    #[error("too many parents: {0}")]
    TooManyParents(usize),

    /// A message does not fit the u32 length prefix.
    #[error("message too long: {0} bytes")]
    MessageTooLong(usize),
}

/// Result alias for object operations.
pub type ObjectResult<T> = Result<T, ObjectError>;
