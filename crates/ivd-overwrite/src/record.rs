use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ivd_types::{Hash, Identity};

/// Why a seal was displaced from head history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwriteCategory {
    Squash,
    Amend,
    Rebase,
    Cleanup,
    Refactor,
    Mistake,
    Security,
}

impl std::fmt::Display for OverwriteCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Squash => "squash",
            Self::Amend => "amend",
            Self::Rebase => "rebase",
            Self::Cleanup => "cleanup",
            Self::Refactor => "refactor",
            Self::Mistake => "mistake",
            Self::Security => "security",
        };
        f.write_str(s)
    }
}

/// One recorded history rewrite.
///
/// Both `original` and `replacement` remain addressable in the object store
/// for as long as the record exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverwriteRecord {
    /// Record id (UUID v7; time-ordered at millisecond granularity).
    pub id: Uuid,
    /// The seal that was displaced.
    pub original: Hash,
    /// The seal that took its place.
    pub replacement: Hash,
    /// Kind of rewrite.
    pub category: OverwriteCategory,
    /// Mandatory, non-empty reason.
    pub justification: String,
    /// Who performed the rewrite.
    pub author: Identity,
    /// When, UTC nanoseconds.
    pub timestamp: u64,
}
