/// Errors from chunker configuration and dedup accounting.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChunkError {
    /// Sizes must satisfy `min <= avg <= max` and be non-zero.
    #[error("invalid chunk sizes: min={min}, avg={avg}, max={max}")]
    InvalidSizes { min: u32, avg: u32, max: u32 },

    /// Released a chunk that has no outstanding references.
    #[error("chunk has no outstanding references: {0}")]
    NotReferenced(String),
}

/// Result alias for chunking operations.
pub type ChunkResult<T> = Result<T, ChunkError>;
