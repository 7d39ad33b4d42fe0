//! Timeline switching: WAL-phased orchestration and startup recovery.
//!
//! A switch is atomic with respect to crash: after recovery the repository
//! is either fully on the old timeline with the stash preserved, or fully
//! on the new timeline with the stash reapplied (possibly with conflict
//! files). The WAL primitives live in `ivd-timeline`; this module sequences
//! them against the store, the worktree, and the workspace.

use std::fs;

use tracing::{info, warn};

use ivd_objects::{ObjectKind, Seal, Tree};
use ivd_store::StoreError;
use ivd_timeline::{RecoveryAction, SwitchJournal, SwitchPhase, SwitchRecord};
use ivd_types::Hash;
use ivd_worktree::{checkout, Stash};

use crate::error::{RepoError, RepoResult};
use crate::repository::Repository;

/// What a completed switch reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwitchOutcome {
    /// The timeline now current.
    pub timeline: String,
    /// Conflict files written during stash reapply. Non-fatal; they show
    /// up on the next status.
    pub conflicts: Vec<String>,
}

impl Repository {
    /// Switch to another timeline, preserving uncommitted work.
    ///
    /// Sequence: recover any pending switch, then WAL start -> stash ->
    /// checkout -> reapply -> update current -> clear. A failure after WAL
    /// start leaves the journal in place for recovery rather than rolling
    /// back.
    pub fn switch_timeline(&mut self, name: &str) -> RepoResult<SwitchOutcome> {
        if name == self.timelines.current() {
            return Ok(SwitchOutcome {
                timeline: name.to_string(),
                conflicts: Vec::new(),
            });
        }
        self.recover_pending_switch()?;

        let target_head = self.timelines.head_of(name)?;
        let (wal_target, target_tree) = self.switch_target(target_head)?;
        let from_head = self.head();
        let from_tree_hash = if from_head.is_zero() {
            Hash::ZERO
        } else {
            self.load_seal(&from_head, "switch source")?.tree
        };
        let current_tree = self.tree_of_head(from_head)?;
        let from_timeline = self.timelines.current().to_string();

        let journal = SwitchJournal::new(self.ivaldi_dir());
        let mut record = journal.begin(from_tree_hash, wal_target, &from_timeline, name)?;

        // The workspace state of the timeline being left must survive it.
        self.workspace.save()?;

        let stash = Stash::build(self.store.as_ref(), &current_tree, self.root())?;
        self.save_stash(&stash)?;
        journal.advance(&mut record, SwitchPhase::Stashed)?;

        checkout(self.store.as_ref(), &target_tree, self.root())?;
        journal.advance(&mut record, SwitchPhase::CheckedOut)?;

        let report = stash.reapply(self.store.as_ref(), &target_tree, self.root())?;

        self.timelines.set_current(name)?;
        self.catalog.position.set_current(target_head);
        self.catalog.save()?;
        self.rebind_workspace(name)?;

        journal.clear()?;
        self.remove_stash_file()?;

        info!(
            from = %from_timeline,
            to = name,
            conflicts = report.conflicts.len(),
            "timeline switch complete"
        );
        Ok(SwitchOutcome {
            timeline: name.to_string(),
            conflicts: report.conflicts,
        })
    }

    /// Run startup recovery for an interrupted switch, per the journal's
    /// classification.
    pub(crate) fn recover_pending_switch(&mut self) -> RepoResult<()> {
        let journal = SwitchJournal::new(self.ivaldi_dir());
        let action = journal
            .recovery_action()
            .map_err(|e| RepoError::WalRecoveryFailed(e.to_string()))?;

        match action {
            RecoveryAction::None => Ok(()),
            RecoveryAction::Discard => {
                warn!("discarding pre-durability switch journal");
                journal
                    .clear()
                    .map_err(|e| RepoError::WalRecoveryFailed(e.to_string()))?;
                self.remove_stash_file()
            }
            RecoveryAction::ResumeCheckout(mut record) => {
                info!(to = %record.to_seal.short(), "resuming interrupted switch");
                let tree = self.target_tree_of(record.to_seal)?;
                checkout(self.store.as_ref(), &tree, self.root())
                    .map_err(|e| RepoError::WalRecoveryFailed(e.to_string()))?;
                journal
                    .advance(&mut record, SwitchPhase::CheckedOut)
                    .map_err(|e| RepoError::WalRecoveryFailed(e.to_string()))?;
                self.finalize_switch(&journal, record)
            }
            RecoveryAction::Finalize(record) => {
                info!(to = %record.to_seal.short(), "finalizing interrupted switch");
                self.finalize_switch(&journal, record)
            }
        }
    }

    /// Complete a switch whose checkout already happened: reapply the
    /// persisted stash (if any), move the current pointer, clear the
    /// journal.
    fn finalize_switch(
        &mut self,
        journal: &SwitchJournal,
        record: SwitchRecord,
    ) -> RepoResult<()> {
        let tree = self.target_tree_of(record.to_seal)?;

        if let Some(stash) = self.load_stash()? {
            let report = stash
                .reapply(self.store.as_ref(), &tree, self.root())
                .map_err(|e| RepoError::WalRecoveryFailed(e.to_string()))?;
            if !report.conflicts.is_empty() {
                warn!(
                    conflicts = report.conflicts.len(),
                    "stash reapply during recovery wrote conflict files"
                );
            }
        }

        // Restore the current pointer. A minimal record without the
        // timeline name falls back to matching the target against heads.
        let timeline = record.to_timeline.clone().or_else(|| {
            let names: Vec<String> = self
                .timelines
                .names()
                .into_iter()
                .map(str::to_string)
                .collect();
            names.into_iter().find(|name| {
                self.timelines
                    .head_of(name)
                    .map(|head| head == record.to_seal)
                    .unwrap_or(false)
            })
        });
        if let Some(timeline) = timeline {
            if self.timelines.exists(&timeline) {
                self.timelines.set_current(&timeline)?;
                self.catalog.position.set_current(self.timelines.current_head());
                self.catalog.save()?;
                self.rebind_workspace(&timeline)?;
            }
        } else {
            warn!("switch journal target matches no timeline head; current pointer unchanged");
        }

        journal
            .clear()
            .map_err(|e| RepoError::WalRecoveryFailed(e.to_string()))?;
        self.remove_stash_file()
    }

    /// The WAL target object and tree for a switch: the target seal, or,
    /// for a never-sealed timeline, the empty tree stored as a real object
    /// (zero never enters the journal).
    fn switch_target(&self, target_head: Hash) -> RepoResult<(Hash, Tree)> {
        if target_head.is_zero() {
            let empty = Tree::empty();
            let hash = self.store.put(&empty.encode()?, ObjectKind::Tree)?;
            Ok((hash, empty))
        } else {
            let seal = self.load_seal(&target_head, "switch target")?;
            let tree = self.load_tree(&seal.tree, "switch target")?;
            Ok((target_head, tree))
        }
    }

    /// Resolve a journal target to its tree: a seal's tree, or the tree
    /// object itself.
    fn target_tree_of(&self, target: Hash) -> RepoResult<Tree> {
        match self.store.get(&target) {
            Ok((payload, ObjectKind::Seal)) => {
                let seal = Seal::decode(&payload)?;
                self.load_tree(&seal.tree, "switch recovery")
            }
            Ok((payload, ObjectKind::Tree)) => Ok(Tree::decode(&payload)?),
            Ok((_, kind)) => Err(RepoError::MissingObject {
                hash: target,
                context: format!("switch recovery: unexpected {kind} object"),
            }),
            Err(StoreError::NotFound(_)) => Err(RepoError::MissingObject {
                hash: target,
                context: "switch recovery".to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    // ---------------------------------------------------------------
    // Stash persistence alongside the journal
    // ---------------------------------------------------------------

    fn stash_path(&self) -> std::path::PathBuf {
        self.ivaldi_dir().join("journal").join("stash.json")
    }

    pub(crate) fn save_stash(&self, stash: &Stash) -> RepoResult<()> {
        let path = self.stash_path();
        let parent = path.parent().expect("stash path has a parent");
        fs::create_dir_all(parent).map_err(|e| RepoError::io("create_dir", parent, e))?;
        let json =
            serde_json::to_vec_pretty(stash).map_err(|e| RepoError::State(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| RepoError::io("create_temp", parent, e))?;
        std::io::Write::write_all(&mut tmp, &json)
            .map_err(|e| RepoError::io("write", tmp.path().to_path_buf(), e))?;
        tmp.persist(&path)
            .map_err(|e| RepoError::io("rename", &path, e.error))?;
        Ok(())
    }

    pub(crate) fn load_stash(&self) -> RepoResult<Option<Stash>> {
        match fs::read(self.stash_path()) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(stash) => Ok(Some(stash)),
                Err(e) => {
                    warn!(error = %e, "persisted stash is unparseable; skipping reapply");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RepoError::io("read", self.stash_path(), e)),
        }
    }

    pub(crate) fn remove_stash_file(&self) -> RepoResult<()> {
        match fs::remove_file(self.stash_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RepoError::io("remove", self.stash_path(), e)),
        }
    }
}
