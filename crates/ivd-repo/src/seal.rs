//! The seal lifecycle: creating seals and rewriting them under the
//! overwrite log.

use tracing::info;
use uuid::Uuid;

use ivd_objects::{ObjectKind, Seal};
use ivd_overwrite::OverwriteCategory;
use ivd_types::{now_nanos, validate_message, Hash};

use crate::error::RepoResult;
use crate::repository::Repository;
use crate::RepoError;

/// What a successful seal produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealOutcome {
    /// Hash of the new seal.
    pub hash: Hash,
    /// Iteration number on the current timeline.
    pub iteration: u64,
    /// Freshly assigned memorable name.
    pub memorable_name: String,
    /// Hash of the sealed candidate tree.
    pub tree: Hash,
}

impl Repository {
    /// Seal the gathered changes.
    ///
    /// Requires a non-empty candidate tree; fails with the nothing-gathered
    /// error otherwise. On success the anvil is cleared and a rescan leaves
    /// every sealed file Unmodified.
    pub fn seal(&mut self, message: &str) -> RepoResult<SealOutcome> {
        validate_message(message)?;

        let tree = self.workspace.build_candidate_tree()?;
        let parent = self.head();
        let seal = Seal {
            tree,
            parents: if parent.is_zero() {
                Vec::new()
            } else {
                vec![parent]
            },
            author: self.config.user.clone(),
            committer: self.config.user.clone(),
            message: message.to_string(),
            timestamp: now_nanos(),
        };
        let hash = self.store.put(&seal.encode()?, ObjectKind::Seal)?;

        let timeline = self.timelines.current().to_string();
        self.timelines.update_head(&timeline, hash)?;
        let (iteration, memorable_name) = self.catalog.record_seal(&timeline, hash);
        self.catalog.save()?;

        self.workspace.mark_sealed();
        self.workspace.scan()?;
        self.workspace.save()?;

        info!(
            timeline = %timeline,
            seal = %hash.short(),
            iteration,
            name = %memorable_name,
            "sealed"
        );
        Ok(SealOutcome {
            hash,
            iteration,
            memorable_name,
            tree,
        })
    }

    /// Replace the head seal with one carrying a new message (and the
    /// anvil's contents, if anything is gathered).
    ///
    /// This displaces a committed seal, so it records an overwrite first;
    /// the record id is returned with the outcome. The original seal stays
    /// in the store.
    pub fn amend(
        &mut self,
        message: &str,
        category: OverwriteCategory,
        justification: &str,
    ) -> RepoResult<(SealOutcome, Uuid)> {
        validate_message(message)?;
        let original = self.head();
        if original.is_zero() {
            return Err(RepoError::NothingToAmend);
        }
        let old_seal = self.load_seal(&original, "amend")?;

        let tree = if self.workspace.has_gathered() {
            self.workspace.build_candidate_tree()?
        } else {
            old_seal.tree
        };
        let replacement_seal = Seal {
            tree,
            parents: old_seal.parents.clone(),
            author: self.config.user.clone(),
            committer: self.config.user.clone(),
            message: message.to_string(),
            timestamp: now_nanos(),
        };
        let replacement = self.store.put(&replacement_seal.encode()?, ObjectKind::Seal)?;

        // The overwrite record lands before the head moves; a protected
        // original aborts here with the head untouched.
        let record_id = self.overwrites.record(
            original,
            replacement,
            category,
            justification,
            self.config.user.clone(),
        )?;

        let timeline = self.timelines.current().to_string();
        self.timelines.update_head(&timeline, replacement)?;
        let history_len = self.catalog.position.history(&timeline).len();
        self.catalog.position.rewrite_tail(
            &timeline,
            history_len.saturating_sub(1),
            vec![replacement],
        );
        let iteration = self.catalog.iterations.next(&timeline);
        let memorable_name = self.catalog.names.assign(replacement);
        self.catalog.save()?;

        if self.workspace.has_gathered() {
            self.workspace.mark_sealed();
            self.workspace.scan()?;
        }
        self.workspace.save()?;

        info!(
            original = %original.short(),
            replacement = %replacement.short(),
            "head amended"
        );
        Ok((
            SealOutcome {
                hash: replacement,
                iteration,
                memorable_name,
                tree,
            },
            record_id,
        ))
    }

    /// Mark a seal non-overwritable.
    pub fn protect(&mut self, seal: Hash) -> RepoResult<()> {
        Ok(self.overwrites.protect(seal)?)
    }

    /// Returns `true` if a seal is protected.
    pub fn is_protected(&self, seal: &Hash) -> bool {
        self.overwrites.is_protected(seal)
    }

    /// All overwrite records, oldest first.
    pub fn overwrite_records(&self) -> &[ivd_overwrite::OverwriteRecord] {
        self.overwrites.records()
    }
}
