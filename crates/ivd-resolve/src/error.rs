/// Errors from reference resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Every strategy was tried and none matched.
    #[error("could not resolve {input:?} (tried: {})", tried.join(", "))]
    Unresolved {
        input: String,
        tried: Vec<&'static str>,
    },

    /// Store operation failed mid-resolution.
    #[error(transparent)]
    Store(#[from] ivd_store::StoreError),

    /// A referenced object failed to decode.
    #[error(transparent)]
    Object(#[from] ivd_objects::ObjectError),
}

/// Result alias for resolution operations.
pub type ResolveResult<T> = Result<T, ResolveError>;
