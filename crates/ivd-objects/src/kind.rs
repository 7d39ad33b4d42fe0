use serde::{Deserialize, Serialize};

/// The kind of object stored.
///
/// The kind byte is the first byte of every object file on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Raw content (file contents, arbitrary data).
    Blob,
    /// Directory listing: ordered entries mapping names to object references.
    Tree,
    /// An immutable commit object.
    Seal,
    /// A named, annotated pointer at another object.
    Tag,
}

impl ObjectKind {
    /// The on-disk kind byte.
    pub fn kind_byte(&self) -> u8 {
        match self {
            Self::Blob => 0,
            Self::Tree => 1,
            Self::Seal => 2,
            Self::Tag => 3,
        }
    }

    /// Parse an on-disk kind byte.
    pub fn from_kind_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Blob),
            1 => Some(Self::Tree),
            2 => Some(Self::Seal),
            3 => Some(Self::Tag),
            _ => None,
        }
    }

    /// All object kinds, in kind-byte order.
    pub fn all() -> [Self; 4] {
        [Self::Blob, Self::Tree, Self::Seal, Self::Tag]
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Tree => write!(f, "tree"),
            Self::Seal => write!(f, "seal"),
            Self::Tag => write!(f, "tag"),
        }
    }
}
