use serde::{Deserialize, Serialize};

use ivd_types::Hash;

use crate::cursor::{put_hash, Cursor};
use crate::error::{ObjectError, ObjectResult};
use crate::kind::ObjectKind;

/// File mode for a tree entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryMode {
    /// Normal file (0o100644).
    Regular,
    /// Executable file (0o100755).
    Executable,
    /// Symbolic link (0o120000).
    Symlink,
    /// Subtree / directory (0o040000).
    Directory,
}

impl EntryMode {
    /// Octal mode value used by the wire encoding.
    pub fn mode_bits(&self) -> u32 {
        match self {
            Self::Regular => 0o100644,
            Self::Executable => 0o100755,
            Self::Symlink => 0o120000,
            Self::Directory => 0o040000,
        }
    }

    /// Parse from an octal mode value.
    pub fn from_mode_bits(bits: u32) -> Option<Self> {
        match bits {
            0o100644 => Some(Self::Regular),
            0o100755 => Some(Self::Executable),
            0o120000 => Some(Self::Symlink),
            0o040000 => Some(Self::Directory),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:06o}", self.mode_bits())
    }
}

/// A single entry in a tree object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// File mode (regular, executable, symlink, directory).
    pub mode: EntryMode,
    /// Entry name. Non-empty, unique within the tree.
    pub name: String,
    /// The kind of the referenced object.
    pub kind: ObjectKind,
    /// Content address of the referenced object.
    pub hash: Hash,
}

impl TreeEntry {
    /// Create a new tree entry.
    pub fn new(mode: EntryMode, name: impl Into<String>, kind: ObjectKind, hash: Hash) -> Self {
        Self {
            mode,
            name: name.into(),
            kind,
            hash,
        }
    }
}

/// Directory listing object.
///
/// Entries are kept sorted strictly ascending by name (bytewise), which makes
/// the encoding deterministic: identical logical contents always hash the
/// same. An empty tree encodes to an empty byte sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Create a tree from entries, sorting by name and rejecting empty or
    /// duplicate names.
    pub fn new(mut entries: Vec<TreeEntry>) -> ObjectResult<Self> {
        entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        for pair in entries.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(ObjectError::DuplicateEntry(pair[0].name.clone()));
            }
        }
        for entry in &entries {
            if entry.name.is_empty() {
                return Err(ObjectError::EmptyEntryName);
            }
        }
        Ok(Self { entries })
    }

    /// Create an empty tree.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The sorted entries.
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_bytes().cmp(name.as_bytes()))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode to the deterministic wire format.
    ///
    /// Each entry is
    /// `[mode: u32 BE][kind: u8][name_len: u16 BE][name][hash_algo: u8][hash: 32]`,
    /// entries in ascending name order.
    pub fn encode(&self) -> ObjectResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.entries.len() * 48);
        for entry in &self.entries {
            if entry.name.len() > u16::MAX as usize {
                return Err(ObjectError::NameTooLong(entry.name.len()));
            }
            out.extend_from_slice(&entry.mode.mode_bits().to_be_bytes());
            out.push(entry.kind.kind_byte());
            out.extend_from_slice(&(entry.name.len() as u16).to_be_bytes());
            out.extend_from_slice(entry.name.as_bytes());
            put_hash(&mut out, &entry.hash);
        }
        Ok(out)
    }

    /// Decode from the wire format, rejecting out-of-order or duplicate
    /// entries.
    pub fn decode(data: &[u8]) -> ObjectResult<Self> {
        let mut cursor = Cursor::new(data);
        let mut entries: Vec<TreeEntry> = Vec::new();

        while !cursor.is_empty() {
            let entry_offset = cursor.offset();
            let mode_bits = cursor.u32_be()?;
            let mode = EntryMode::from_mode_bits(mode_bits).ok_or(ObjectError::Decode {
                offset: entry_offset,
                reason: format!("unknown entry mode: {mode_bits:#o}"),
            })?;
            let kind_offset = cursor.offset();
            let kind_byte = cursor.u8()?;
            let kind = ObjectKind::from_kind_byte(kind_byte).ok_or(ObjectError::Decode {
                offset: kind_offset,
                reason: format!("unknown object kind byte: {kind_byte}"),
            })?;
            let name = cursor.string_u16("entry name")?;
            if name.is_empty() {
                return Err(ObjectError::Decode {
                    offset: entry_offset,
                    reason: "empty entry name".into(),
                });
            }
            let hash = cursor.hash()?;

            if let Some(prev) = entries.last() {
                if prev.name.as_bytes() >= name.as_bytes() {
                    return Err(ObjectError::Decode {
                        offset: entry_offset,
                        reason: format!(
                            "entries out of order: {:?} follows {:?}",
                            name, prev.name
                        ),
                    });
                }
            }
            entries.push(TreeEntry {
                mode,
                name,
                kind,
                hash,
            });
        }

        Ok(Self { entries })
    }
}
