use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Digest;

use crate::error::TypeError;

/// The hash algorithm a [`Hash`] was computed with.
///
/// BLAKE3 is the default for throughput; SHA-256 is kept for interop with
/// ecosystems that mandate it. Both produce 32 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HashAlgo {
    Blake3,
    Sha256,
}

impl HashAlgo {
    /// The canonical string prefix for this algorithm (`blake3`, `sha256`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blake3 => "blake3",
            Self::Sha256 => "sha256",
        }
    }

    /// Single-byte wire tag used by the object encodings.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Blake3 => 0,
            Self::Sha256 => 1,
        }
    }

    /// Parse a wire tag back into an algorithm.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Blake3),
            1 => Some(Self::Sha256),
            _ => None,
        }
    }

    /// Parse an algorithm prefix string.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        match s {
            "blake3" => Ok(Self::Blake3),
            "sha256" => Ok(Self::Sha256),
            other => Err(TypeError::InvalidHash(format!(
                "unknown algorithm: {other}"
            ))),
        }
    }
}

impl fmt::Display for HashAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Algorithm-tagged content address.
///
/// Two hashes are equal iff both the algorithm and the 32-byte value match.
/// The canonical string form is `algo:hex`; a bare 64-character hex string
/// parses as BLAKE3. The all-zero hash is reserved and never names a stored
/// object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash {
    algo: HashAlgo,
    bytes: [u8; 32],
}

impl Default for Hash {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Hash {
    /// The reserved zero hash (BLAKE3-tagged, all-zero value).
    pub const ZERO: Self = Self {
        algo: HashAlgo::Blake3,
        bytes: [0u8; 32],
    };

    /// Compute the hash of `data` with the given algorithm.
    pub fn compute(data: &[u8], algo: HashAlgo) -> Self {
        match algo {
            HashAlgo::Blake3 => Self {
                algo,
                bytes: *blake3::hash(data).as_bytes(),
            },
            HashAlgo::Sha256 => {
                let digest = sha2::Sha256::digest(data);
                let mut bytes = [0u8; 32];
                bytes.copy_from_slice(&digest);
                Self { algo, bytes }
            }
        }
    }

    /// Compute the BLAKE3 hash of `data`.
    pub fn blake3(data: &[u8]) -> Self {
        Self::compute(data, HashAlgo::Blake3)
    }

    /// Construct from a pre-computed value.
    pub fn from_raw(algo: HashAlgo, bytes: [u8; 32]) -> Self {
        Self { algo, bytes }
    }

    /// Returns `true` if `data` hashes to this value under this algorithm.
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::compute(data, self.algo) == *self
    }

    /// Returns `true` if this is the reserved zero value.
    pub fn is_zero(&self) -> bool {
        self.bytes == [0u8; 32]
    }

    /// The algorithm this hash was computed with.
    pub fn algo(&self) -> HashAlgo {
        self.algo
    }

    /// The raw 32-byte value.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Hex-encoded value without the algorithm prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Short hex form (first 8 characters) for logs and display.
    pub fn short(&self) -> String {
        hex::encode(&self.bytes[..4])
    }

    /// Parse `algo:hex` or bare 64-char hex (defaults to BLAKE3).
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let (algo, hex_part) = match s.split_once(':') {
            Some((prefix, rest)) => (HashAlgo::parse(prefix)?, rest),
            None => (HashAlgo::Blake3, s),
        };
        if hex_part.len() != 64 {
            return Err(TypeError::InvalidHash(format!(
                "expected 64 hex characters, got {}",
                hex_part.len()
            )));
        }
        let decoded =
            hex::decode(hex_part).map_err(|e| TypeError::InvalidHash(e.to_string()))?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&decoded);
        Ok(Self { algo, bytes })
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({}:{})", self.algo, self.short())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algo, self.to_hex())
    }
}

impl FromStr for Hash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// Hashes serialize as their canonical string form so that every JSON file
// under `.ivaldi/` stays human-readable and diffable.
impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Incremental hasher for content too large to buffer in memory.
///
/// Implements [`io::Write`] so callers can `io::copy` a file straight into
/// the hasher.
pub enum HashWriter {
    Blake3(Box<blake3::Hasher>),
    Sha256(sha2::Sha256),
}

impl HashWriter {
    /// Start a new incremental hash with the given algorithm.
    pub fn new(algo: HashAlgo) -> Self {
        match algo {
            HashAlgo::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
            HashAlgo::Sha256 => Self::Sha256(sha2::Sha256::new()),
        }
    }

    /// Feed a chunk of input.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Blake3(h) => {
                h.update(data);
            }
            Self::Sha256(h) => h.update(data),
        }
    }

    /// Finish and produce the tagged hash.
    pub fn finalize(self) -> Hash {
        match self {
            Self::Blake3(h) => Hash::from_raw(HashAlgo::Blake3, *h.finalize().as_bytes()),
            Self::Sha256(h) => {
                let digest = h.finalize();
                let mut bytes = [0u8; 32];
                bytes.copy_from_slice(&digest);
                Hash::from_raw(HashAlgo::Sha256, bytes)
            }
        }
    }
}

impl io::Write for HashWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
