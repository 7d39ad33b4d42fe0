use fastcdc::v2020::FastCDC;
use serde::{Deserialize, Serialize};

use ivd_types::{Hash, HashAlgo};

use crate::error::{ChunkError, ChunkResult};

/// Chunk size bounds in bytes.
///
/// The defaults are 2 KiB / 8 KiB / 32 KiB. These values are part of the
/// storage format: changing them changes every chunk boundary, so they are
/// fixed for the life of a repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Minimum chunk size.
    pub min: u32,
    /// Target average chunk size.
    pub avg: u32,
    /// Maximum chunk size.
    pub max: u32,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min: 2 * 1024,
            avg: 8 * 1024,
            max: 32 * 1024,
        }
    }
}

impl ChunkerConfig {
    /// Validate the size relationship. The floors (64-byte minimum,
    /// 256-byte average) come from the FastCDC algorithm's own bounds.
    pub fn validate(&self) -> ChunkResult<()> {
        if self.min < 64 || self.avg < 256 || self.min > self.avg || self.avg > self.max {
            return Err(ChunkError::InvalidSizes {
                min: self.min,
                avg: self.avg,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// One chunk of a larger byte sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Byte offset of the chunk within the source.
    pub offset: u64,
    /// Chunk length in bytes.
    pub length: usize,
    /// Content address of the chunk bytes.
    pub hash: Hash,
}

/// Deterministic content-defined chunker.
pub struct Chunker {
    config: ChunkerConfig,
    algo: HashAlgo,
}

impl Chunker {
    /// Create a chunker with the default sizes, hashing chunks with BLAKE3.
    pub fn new() -> Self {
        Self {
            config: ChunkerConfig::default(),
            algo: HashAlgo::Blake3,
        }
    }

    /// Create a chunker with explicit sizes and hash algorithm.
    pub fn with_config(config: ChunkerConfig, algo: HashAlgo) -> ChunkResult<Self> {
        config.validate()?;
        Ok(Self { config, algo })
    }

    /// The configured size bounds.
    pub fn config(&self) -> ChunkerConfig {
        self.config
    }

    /// Split `data` into content-defined chunks.
    ///
    /// Identical input always yields the identical chunk sequence. Every
    /// byte of the input is covered exactly once, in order.
    pub fn chunk(&self, data: &[u8]) -> Vec<Chunk> {
        if data.is_empty() {
            return Vec::new();
        }
        FastCDC::new(data, self.config.min, self.config.avg, self.config.max)
            .map(|c| Chunk {
                offset: c.offset as u64,
                length: c.length,
                hash: Hash::compute(&data[c.offset..c.offset + c.length], self.algo),
            })
            .collect()
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new()
    }
}
