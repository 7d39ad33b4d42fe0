//! The strategy-ordered reference resolver.

use chrono::{DateTime, Utc};
use similar::{ChangeTag, TextDiff};
use tracing::warn;

use ivd_history::Catalog;
use ivd_objects::{ObjectKind, Seal, Tree};
use ivd_store::{ObjectStore, StoreError};
use ivd_types::Hash;

use crate::error::{ResolveError, ResolveResult};
use crate::temporal::{parse_temporal, TemporalQuery};

/// Resolves user input to a seal hash against one repository's catalog.
///
/// `now` is injectable so temporal phrases are testable.
pub struct Resolver<'a> {
    catalog: &'a Catalog,
    store: &'a dyn ObjectStore,
    timeline: &'a str,
    now: DateTime<Utc>,
}

impl<'a> Resolver<'a> {
    /// Resolver for the given catalog, store, and current timeline.
    pub fn new(catalog: &'a Catalog, store: &'a dyn ObjectStore, timeline: &'a str) -> Self {
        Self {
            catalog,
            store,
            timeline,
            now: Utc::now(),
        }
    }

    /// Same, with an explicit "now" for temporal phrases.
    pub fn with_now(
        catalog: &'a Catalog,
        store: &'a dyn ObjectStore,
        timeline: &'a str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            catalog,
            store,
            timeline,
            now,
        }
    }

    /// Resolve `input` to a seal hash, trying each strategy in order.
    pub fn resolve(&self, input: &str) -> ResolveResult<Hash> {
        let input = input.trim();
        let mut tried = Vec::new();

        tried.push("alias");
        if let Some(hash) = self.catalog.aliases.lookup(input) {
            return Ok(hash);
        }

        tried.push("memorable-name");
        if let Some(hash) = self.catalog.names.lookup(input) {
            return Ok(hash);
        }

        tried.push("iteration");
        if let Some(hash) = self.resolve_iteration(input) {
            return Ok(hash);
        }

        tried.push("hash");
        if let Ok(hash) = Hash::parse(input) {
            if self.store.exists(&hash)? {
                return Ok(hash);
            }
        }

        tried.push("temporal");
        if let Some(query) = parse_temporal(input, self.now) {
            if let Some(hash) = self.resolve_temporal(&query)? {
                return Ok(hash);
            }
        }

        tried.push("author");
        if let Some(hash) = self.resolve_author(input)? {
            return Ok(hash);
        }

        tried.push("content");
        if let Some(hash) = self.resolve_content(input)? {
            return Ok(hash);
        }

        Err(ResolveError::Unresolved {
            input: input.to_string(),
            tried,
        })
    }

    // ---------------------------------------------------------------
    // Strategies
    // ---------------------------------------------------------------

    /// `#N`, `#-N`, `<timeline>#N`.
    fn resolve_iteration(&self, input: &str) -> Option<Hash> {
        let (timeline, token) = match input.split_once('#') {
            Some(("", token)) => (self.timeline, token),
            Some((timeline, token)) => (timeline, token),
            None => return None,
        };
        if token.is_empty() || token.contains('#') {
            return None;
        }
        if let Some(back) = token.strip_prefix('-') {
            let k: u64 = back.parse().ok()?;
            self.catalog.position.entry_back(timeline, k)
        } else {
            let n: u64 = token.parse().ok()?;
            self.catalog.position.entry_at(timeline, n)
        }
    }

    /// Nearest seal inside the temporal window, across all timelines.
    fn resolve_temporal(&self, query: &TemporalQuery) -> ResolveResult<Option<Hash>> {
        let mut best: Option<(u64, Hash)> = None;
        for (hash, seal) in self.all_seals()? {
            if !query.contains_nanos(seal.timestamp) {
                continue;
            }
            let distance = query.distance_nanos(seal.timestamp);
            if best.map_or(true, |(d, _)| distance < d) {
                best = Some((distance, hash));
            }
        }
        Ok(best.map(|(_, h)| h))
    }

    /// `<name>'s last commit`: latest seal by a case-insensitive author.
    fn resolve_author(&self, input: &str) -> ResolveResult<Option<Hash>> {
        let lower = input.to_lowercase();
        let Some(name) = lower.strip_suffix("'s last commit") else {
            return Ok(None);
        };
        let mut best: Option<(u64, Hash)> = None;
        for (hash, seal) in self.all_seals()? {
            if seal.author.name.to_lowercase() != name {
                continue;
            }
            if best.map_or(true, |(ts, _)| seal.timestamp > ts) {
                best = Some((seal.timestamp, hash));
            }
        }
        Ok(best.map(|(_, h)| h))
    }

    /// `where <s> was added` and `the commit about <s>`, scoped to the
    /// current timeline's history.
    fn resolve_content(&self, input: &str) -> ResolveResult<Option<Hash>> {
        let lower = input.to_lowercase();

        if let Some(rest) = lower.strip_prefix("where ") {
            if let Some(needle) = rest.strip_suffix(" was added") {
                // Earliest introduction wins.
                for hash in self.catalog.position.history(self.timeline) {
                    let Some(seal) = self.load_seal(hash)? else {
                        continue;
                    };
                    let added = self.added_text(&seal)?;
                    if added.to_lowercase().contains(needle) {
                        return Ok(Some(*hash));
                    }
                }
                return Ok(None);
            }
        }

        if let Some(needle) = lower.strip_prefix("the commit about ") {
            let mut best: Option<(u64, Hash)> = None;
            for hash in self.catalog.position.history(self.timeline) {
                let Some(seal) = self.load_seal(hash)? else {
                    continue;
                };
                let message_hits = count_occurrences(&seal.message.to_lowercase(), needle);
                let content_hits =
                    count_occurrences(&self.added_text(&seal)?.to_lowercase(), needle);
                let score = message_hits * 3 + content_hits;
                if score > 0 && best.map_or(true, |(s, _)| score > s) {
                    best = Some((score, *hash));
                }
            }
            return Ok(best.map(|(_, h)| h));
        }

        Ok(None)
    }

    // ---------------------------------------------------------------
    // Object access
    // ---------------------------------------------------------------

    /// Every seal reachable from any timeline's history, deduplicated.
    fn all_seals(&self) -> ResolveResult<Vec<(Hash, Seal)>> {
        let mut seen = std::collections::BTreeSet::new();
        let mut seals = Vec::new();
        for timeline in self.catalog.position.timelines() {
            for hash in self.catalog.position.history(timeline) {
                if !seen.insert(*hash) {
                    continue;
                }
                if let Some(seal) = self.load_seal(hash)? {
                    seals.push((*hash, seal));
                }
            }
        }
        Ok(seals)
    }

    fn load_seal(&self, hash: &Hash) -> ResolveResult<Option<Seal>> {
        match self.store.get(hash) {
            Ok((payload, ObjectKind::Seal)) => Ok(Some(Seal::decode(&payload)?)),
            Ok((_, kind)) => {
                warn!(hash = %hash.short(), %kind, "history entry is not a seal");
                Ok(None)
            }
            Err(StoreError::NotFound(_)) => {
                warn!(hash = %hash.short(), "history references a missing seal");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn load_tree(&self, hash: &Hash) -> ResolveResult<Option<Tree>> {
        match self.store.get(hash) {
            Ok((payload, ObjectKind::Tree)) => Ok(Some(Tree::decode(&payload)?)),
            Ok(_) => Ok(None),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn blob_text(&self, hash: &Hash) -> ResolveResult<String> {
        match self.store.get(hash) {
            Ok((payload, _)) => Ok(String::from_utf8_lossy(&payload).into_owned()),
            Err(StoreError::NotFound(_)) => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Concatenated lines this seal added relative to its primary parent.
    fn added_text(&self, seal: &Seal) -> ResolveResult<String> {
        let Some(tree) = self.load_tree(&seal.tree)? else {
            return Ok(String::new());
        };
        let parent_tree = match seal.primary_parent() {
            Some(parent) => match self.load_seal(parent)? {
                Some(parent_seal) => self.load_tree(&parent_seal.tree)?,
                None => None,
            },
            None => None,
        };

        let mut added = String::new();
        for entry in tree.entries() {
            let parent_hash = parent_tree
                .as_ref()
                .and_then(|t| t.get(&entry.name))
                .map(|e| e.hash);
            if parent_hash == Some(entry.hash) {
                continue;
            }
            let new_text = self.blob_text(&entry.hash)?;
            let old_text = match parent_hash {
                Some(hash) => self.blob_text(&hash)?,
                None => String::new(),
            };
            let diff = TextDiff::from_lines(&old_text, &new_text);
            for change in diff.iter_all_changes() {
                if change.tag() == ChangeTag::Insert {
                    added.push_str(change.value());
                }
            }
        }
        Ok(added)
    }
}

fn count_occurrences(haystack: &str, needle: &str) -> u64 {
    if needle.is_empty() {
        return 0;
    }
    haystack.match_indices(needle).count() as u64
}
