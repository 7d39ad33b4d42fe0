//! Write-ahead log for timeline switches.
//!
//! Exactly one record exists at rest, in `.ivaldi/journal/switch.json`,
//! written atomically via temp-file + rename. Phases advance strictly
//! `Start -> Stashed -> CheckedOut`; the file's absence means no switch is
//! in flight. Recovery classifies whatever is found on startup:
//!
//! - no file: nothing to do
//! - unparseable, or a placeholder record: delete it
//! - `Start`: nothing durable happened beyond the record; delete it
//! - `Stashed`: the stash is safe; resume by checking out the target
//! - `CheckedOut`: the checkout finished; clearing the record finalizes

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ivd_types::Hash;

use crate::error::{TimelineError, TimelineResult};
use crate::manager::write_json;

/// Phase of an in-flight switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchPhase {
    /// The record exists; nothing else is durable yet.
    Start,
    /// The stash has been built and persisted.
    Stashed,
    /// The target tree is fully checked out.
    CheckedOut,
}

/// The single WAL record.
///
/// The timeline names are carried so recovery can restore the current
/// pointer; a record without them (e.g. written by an older build) still
/// recovers the working tree, and the caller falls back to matching
/// `to_seal` against the heads map.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchRecord {
    /// Tree of the timeline being left (zero if it had no seal yet).
    pub from_tree: Hash,
    /// Seal being switched to (or, for a never-sealed target timeline, the
    /// tree object to check out).
    pub to_seal: Hash,
    /// How far the switch got.
    pub phase: SwitchPhase,
    /// Timeline being left.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_timeline: Option<String>,
    /// Timeline being switched to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_timeline: Option<String>,
}

/// What startup recovery should do with the journal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecoveryAction {
    /// No record; nothing to do.
    None,
    /// The record is garbage or pre-durability; delete it.
    Discard,
    /// Resume: check out the target's tree, then finalize.
    ResumeCheckout(SwitchRecord),
    /// The checkout completed; clearing the record finishes the switch.
    Finalize(SwitchRecord),
}

/// Handle on `.ivaldi/journal/switch.json`.
pub struct SwitchJournal {
    path: PathBuf,
}

impl SwitchJournal {
    /// Journal handle for a repository's `.ivaldi` directory.
    pub fn new(ivaldi_dir: &Path) -> Self {
        Self {
            path: ivaldi_dir.join("journal").join("switch.json"),
        }
    }

    /// Path of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start a switch: write the record at phase `Start`.
    pub fn begin(
        &self,
        from_tree: Hash,
        to_seal: Hash,
        from_timeline: &str,
        to_timeline: &str,
    ) -> TimelineResult<SwitchRecord> {
        let record = SwitchRecord {
            from_tree,
            to_seal,
            phase: SwitchPhase::Start,
            from_timeline: Some(from_timeline.to_string()),
            to_timeline: Some(to_timeline.to_string()),
        };
        write_json(&self.path, &record)?;
        debug!(to = %to_seal.short(), timeline = to_timeline, "switch journal opened");
        Ok(record)
    }

    /// Advance the record to a later phase. Regressions are rejected.
    pub fn advance(&self, record: &mut SwitchRecord, phase: SwitchPhase) -> TimelineResult<()> {
        if phase <= record.phase {
            return Err(TimelineError::PhaseRegression {
                from: format!("{:?}", record.phase),
                to: format!("{phase:?}"),
            });
        }
        record.phase = phase;
        write_json(&self.path, record)?;
        debug!(phase = ?phase, "switch journal advanced");
        Ok(())
    }

    /// Remove the record; the switch is complete.
    pub fn clear(&self) -> TimelineResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TimelineError::io("remove", &self.path, e)),
        }
    }

    /// Read the record if one exists and parses.
    pub fn load(&self) -> TimelineResult<Option<SwitchRecord>> {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(record) => Ok(Some(record)),
                Err(e) => {
                    warn!(error = %e, "switch journal is unparseable");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TimelineError::io("read", &self.path, e)),
        }
    }

    /// Classify the on-disk state for startup recovery.
    ///
    /// `Discard` covers an unparseable file, a placeholder record (zero
    /// target), and phase `Start`; the caller deletes the file and moves on.
    pub fn recovery_action(&self) -> TimelineResult<RecoveryAction> {
        if !self.path.exists() {
            return Ok(RecoveryAction::None);
        }
        let Some(record) = self.load()? else {
            return Ok(RecoveryAction::Discard);
        };
        if record.to_seal.is_zero() {
            warn!("switch journal contains a placeholder record");
            return Ok(RecoveryAction::Discard);
        }
        Ok(match record.phase {
            SwitchPhase::Start => RecoveryAction::Discard,
            SwitchPhase::Stashed => RecoveryAction::ResumeCheckout(record),
            SwitchPhase::CheckedOut => RecoveryAction::Finalize(record),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, SwitchJournal) {
        let dir = tempfile::tempdir().unwrap();
        let journal = SwitchJournal::new(&dir.path().join(".ivaldi"));
        (dir, journal)
    }

    fn hashes() -> (Hash, Hash) {
        (Hash::blake3(b"from tree"), Hash::blake3(b"to seal"))
    }

    #[test]
    fn absent_journal_means_nothing() {
        let (_dir, journal) = setup();
        assert_eq!(journal.recovery_action().unwrap(), RecoveryAction::None);
        assert!(journal.load().unwrap().is_none());
    }

    #[test]
    fn begin_then_clear() {
        let (_dir, journal) = setup();
        let (from, to) = hashes();
        let record = journal.begin(from, to, "main", "feature").unwrap();
        assert_eq!(record.phase, SwitchPhase::Start);
        assert_eq!(record.to_timeline.as_deref(), Some("feature"));
        assert!(journal.path().exists());

        journal.clear().unwrap();
        assert!(!journal.path().exists());
        // Clearing twice is fine.
        journal.clear().unwrap();
    }

    #[test]
    fn phases_advance_strictly() {
        let (_dir, journal) = setup();
        let (from, to) = hashes();
        let mut record = journal.begin(from, to, "main", "feature").unwrap();

        journal.advance(&mut record, SwitchPhase::Stashed).unwrap();
        assert_eq!(journal.load().unwrap().unwrap().phase, SwitchPhase::Stashed);

        assert!(matches!(
            journal.advance(&mut record, SwitchPhase::Start),
            Err(TimelineError::PhaseRegression { .. })
        ));
        assert!(matches!(
            journal.advance(&mut record, SwitchPhase::Stashed),
            Err(TimelineError::PhaseRegression { .. })
        ));

        journal
            .advance(&mut record, SwitchPhase::CheckedOut)
            .unwrap();
        assert_eq!(
            journal.load().unwrap().unwrap().phase,
            SwitchPhase::CheckedOut
        );
    }

    #[test]
    fn recovery_classification() {
        let (_dir, journal) = setup();
        let (from, to) = hashes();

        let mut record = journal.begin(from, to, "main", "feature").unwrap();
        assert_eq!(journal.recovery_action().unwrap(), RecoveryAction::Discard);

        journal.advance(&mut record, SwitchPhase::Stashed).unwrap();
        assert_eq!(
            journal.recovery_action().unwrap(),
            RecoveryAction::ResumeCheckout(record.clone())
        );

        journal
            .advance(&mut record, SwitchPhase::CheckedOut)
            .unwrap();
        assert_eq!(
            journal.recovery_action().unwrap(),
            RecoveryAction::Finalize(record)
        );
    }

    #[test]
    fn unparseable_journal_is_discarded() {
        let (dir, journal) = setup();
        fs::create_dir_all(dir.path().join(".ivaldi/journal")).unwrap();
        fs::write(journal.path(), b"not json at all").unwrap();
        assert_eq!(journal.recovery_action().unwrap(), RecoveryAction::Discard);
    }

    #[test]
    fn minimal_record_without_timeline_names_parses() {
        let (dir, journal) = setup();
        fs::create_dir_all(dir.path().join(".ivaldi/journal")).unwrap();
        let json = format!(
            "{{\"from_tree\":\"{}\",\"to_seal\":\"{}\",\"phase\":\"stashed\"}}",
            Hash::blake3(b"from"),
            Hash::blake3(b"to"),
        );
        fs::write(journal.path(), json).unwrap();
        let record = journal.load().unwrap().unwrap();
        assert_eq!(record.phase, SwitchPhase::Stashed);
        assert!(record.to_timeline.is_none());
        assert!(matches!(
            journal.recovery_action().unwrap(),
            RecoveryAction::ResumeCheckout(_)
        ));
    }

    #[test]
    fn placeholder_record_is_discarded() {
        let (_dir, journal) = setup();
        let record = SwitchRecord {
            from_tree: Hash::blake3(b"from"),
            to_seal: Hash::ZERO,
            phase: SwitchPhase::Stashed,
            from_timeline: None,
            to_timeline: None,
        };
        write_json(journal.path(), &record).unwrap();
        assert_eq!(journal.recovery_action().unwrap(), RecoveryAction::Discard);
    }

    #[test]
    fn zero_from_tree_is_legitimate() {
        // Switching away from a never-sealed timeline records a zero
        // from_tree; that is not a placeholder.
        let (_dir, journal) = setup();
        let mut record = journal
            .begin(Hash::ZERO, Hash::blake3(b"target"), "main", "feature")
            .unwrap();
        journal.advance(&mut record, SwitchPhase::Stashed).unwrap();
        assert_eq!(
            journal.recovery_action().unwrap(),
            RecoveryAction::ResumeCheckout(record)
        );
    }
}
