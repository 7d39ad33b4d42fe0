//! Per-file workspace state.

use serde::{Deserialize, Serialize};

use ivd_objects::EntryMode;
use ivd_types::Hash;

/// Classification of a tracked file relative to its sealed baseline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    /// Content matches the last seal.
    Unmodified,
    /// Content differs from the last seal.
    Modified,
    /// Never sealed on this timeline.
    Added,
    /// Tracked previously but absent from the working tree.
    Deleted,
    /// A changed file that is on the anvil.
    Gathered,
}

/// One tracked file.
///
/// `blob_hash` is the content address of the file as of the last seal
/// (`None` if the file has never been sealed); `content_hash` is the
/// current working-tree content. The two being equal is what Unmodified
/// means.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    /// Repository-relative POSIX path.
    pub path: String,
    /// Classification relative to the sealed baseline.
    pub status: FileStatus,
    /// Hash of the current working-tree content.
    pub content_hash: Hash,
    /// Current size in bytes.
    pub size: u64,
    /// Working-tree mtime, nanoseconds since the Unix epoch.
    pub mtime_nanos: u64,
    /// Whether the file is staged for the next seal.
    pub on_anvil: bool,
    /// Content address as of the last seal, if any.
    pub blob_hash: Option<Hash>,
    /// File mode carried into tree entries.
    pub mode: EntryMode,
}

impl FileState {
    /// Returns `true` if the working-tree content differs from the sealed
    /// baseline (or the file was never sealed).
    pub fn is_changed(&self) -> bool {
        !matches!(self.status, FileStatus::Unmodified)
    }
}

/// Result of a scan: the paths whose classification is not Unmodified.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Files never sealed on this timeline.
    pub added: Vec<String>,
    /// Files whose content differs from the last seal.
    pub modified: Vec<String>,
    /// Files missing from the working tree.
    pub deleted: Vec<String>,
    /// Changed files already sitting on the anvil.
    pub gathered: Vec<String>,
}

impl ScanReport {
    /// Returns `true` if nothing differs from the sealed baseline.
    pub fn is_clean(&self) -> bool {
        self.added.is_empty()
            && self.modified.is_empty()
            && self.deleted.is_empty()
            && self.gathered.is_empty()
    }

    /// Total number of changed paths.
    pub fn change_count(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len() + self.gathered.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_is_clean() {
        let report = ScanReport::default();
        assert!(report.is_clean());
        assert_eq!(report.change_count(), 0);
    }

    #[test]
    fn changed_states() {
        let state = FileState {
            path: "a.txt".into(),
            status: FileStatus::Modified,
            content_hash: Hash::blake3(b"new"),
            size: 3,
            mtime_nanos: 0,
            on_anvil: false,
            blob_hash: Some(Hash::blake3(b"old")),
            mode: EntryMode::Regular,
        };
        assert!(state.is_changed());
    }
}
