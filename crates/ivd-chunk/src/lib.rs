//! Content-defined chunking for Ivaldi.
//!
//! Large files can be stored as a sequence of chunks instead of a single
//! blob. Chunk boundaries come from FastCDC (the 2020 revision and its gear
//! table, as shipped by the `fastcdc` crate), so identical input always
//! produces the identical chunk sequence and shifted content re-aligns
//! quickly. The [`DedupIndex`] counts references per chunk so GC knows when
//! a chunk is free.

pub mod chunker;
pub mod dedup;
pub mod error;

pub use chunker::{Chunk, Chunker, ChunkerConfig};
pub use dedup::DedupIndex;
pub use error::{ChunkError, ChunkResult};
