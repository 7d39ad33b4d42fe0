//! Memorable names and user aliases.
//!
//! Every seal gets a unique `adj-noun-N` name drawn from fixed vocabularies
//! with a 1..=999 suffix. The first candidate is derived deterministically
//! from the seal hash; collisions retry until unique. Names are never
//! reused, even for seals that later fall out of every timeline.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use ivd_types::Hash;

const ADJECTIVES: &[&str] = &[
    "amber", "ancient", "bold", "brave", "bright", "brisk", "calm", "clever",
    "cosmic", "crimson", "curious", "daring", "deep", "eager", "fierce",
    "fleet", "gentle", "gilded", "glad", "golden", "grand", "hardy", "hidden",
    "humble", "iron", "jolly", "keen", "kind", "lively", "lucid", "lunar",
    "mellow", "mighty", "misty", "noble", "northern", "patient", "polished",
    "proud", "quiet", "rapid", "restless", "rugged", "sable", "sharp",
    "silent", "silver", "sleek", "solar", "solid", "stable", "steady",
    "stormy", "sturdy", "subtle", "swift", "tidal", "tranquil", "trusty",
    "vivid", "wandering", "warm", "wild", "wise",
];

const NOUNS: &[&str] = &[
    "anchor", "anvil", "arrow", "badger", "beacon", "bear", "birch", "bridge",
    "brook", "cedar", "comet", "compass", "condor", "coral", "crane", "delta",
    "dragon", "eagle", "ember", "falcon", "fjord", "forge", "fox", "garnet",
    "glacier", "hammer", "harbor", "hawk", "heron", "island", "jaguar",
    "kestrel", "lantern", "lynx", "maple", "meadow", "meteor", "mountain",
    "otter", "owl", "panther", "pebble", "pine", "raven", "reef", "river",
    "salmon", "sparrow", "spruce", "summit", "swan", "thistle", "thunder",
    "tiger", "torrent", "tower", "trail", "valley", "walrus", "whale",
    "willow", "wolf", "wren", "zephyr",
];

/// Bidirectional hash <-> memorable-name catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorableNames {
    by_hash: BTreeMap<Hash, String>,
    by_name: BTreeMap<String, Hash>,
}

impl MemorableNames {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign (or return the existing) memorable name for a seal.
    ///
    /// One hash has at most one canonical name, so re-assigning is a no-op
    /// that returns the original.
    pub fn assign(&mut self, hash: Hash) -> String {
        if let Some(existing) = self.by_hash.get(&hash) {
            return existing.clone();
        }

        let bytes = hash.as_bytes();
        let mut adj = bytes[0] as usize % ADJECTIVES.len();
        let mut noun = bytes[1] as usize % NOUNS.len();
        let mut number = 1 + (u16::from_be_bytes([bytes[2], bytes[3]]) % 999) as u32;

        let mut rng = rand::thread_rng();
        loop {
            let candidate = format!("{}-{}-{}", ADJECTIVES[adj], NOUNS[noun], number);
            if !self.by_name.contains_key(&candidate) {
                self.by_hash.insert(hash, candidate.clone());
                self.by_name.insert(candidate.clone(), hash);
                return candidate;
            }
            adj = rng.gen_range(0..ADJECTIVES.len());
            noun = rng.gen_range(0..NOUNS.len());
            number = rng.gen_range(1..=999);
        }
    }

    /// Resolve a memorable name to its seal.
    pub fn lookup(&self, name: &str) -> Option<Hash> {
        self.by_name.get(name).copied()
    }

    /// The canonical name of a seal, if it has one.
    pub fn name_of(&self, hash: &Hash) -> Option<&str> {
        self.by_hash.get(hash).map(String::as_str)
    }

    /// Number of assigned names.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns `true` if no names have been assigned.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// User-assigned aliases. On lookup these take precedence over memorable
/// names.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aliases {
    map: BTreeMap<String, Hash>,
}

impl Aliases {
    /// Create an empty alias map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an alias, replacing any previous target.
    pub fn set(&mut self, name: impl Into<String>, target: Hash) {
        self.map.insert(name.into(), target);
    }

    /// Resolve an alias.
    pub fn lookup(&self, name: &str) -> Option<Hash> {
        self.map.get(name).copied()
    }

    /// Remove an alias. Returns the old target if it existed.
    pub fn remove(&mut self, name: &str) -> Option<Hash> {
        self.map.remove(name)
    }

    /// All alias names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }
}
