use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info};

use ivd_types::{now_nanos, validate_timeline_name, Hash};

use crate::error::{TimelineError, TimelineResult};
use crate::types::Timeline;

/// Shape of `HEADS.json`.
#[derive(Serialize, Deserialize)]
struct HeadsFile {
    current: String,
    heads: BTreeMap<String, Hash>,
}

/// Shape of `timelines/config.json`.
#[derive(Serialize, Deserialize)]
struct MetaFile {
    timelines: BTreeMap<String, Timeline>,
}

/// Owner of the heads map and timeline metadata.
///
/// Exactly one timeline is current at any time. `main` exists after init
/// and can never be deleted.
pub struct TimelineManager {
    ivaldi_dir: PathBuf,
    current: String,
    heads: BTreeMap<String, Hash>,
    meta: BTreeMap<String, Timeline>,
}

impl TimelineManager {
    /// Initialize the heads map with a `main` timeline at the zero head.
    pub fn init(ivaldi_dir: impl Into<PathBuf>) -> TimelineResult<Self> {
        let ivaldi_dir = ivaldi_dir.into();
        let now = now_nanos();
        let mut heads = BTreeMap::new();
        heads.insert("main".to_string(), Hash::ZERO);
        let mut meta = BTreeMap::new();
        meta.insert(
            "main".to_string(),
            Timeline {
                name: "main".to_string(),
                created_at: now,
                updated_at: now,
                description: String::new(),
                parent_timeline: None,
            },
        );
        let mgr = Self {
            ivaldi_dir,
            current: "main".to_string(),
            heads,
            meta,
        };
        mgr.save()?;
        Ok(mgr)
    }

    /// Load the heads map and metadata from disk.
    pub fn load(ivaldi_dir: impl Into<PathBuf>) -> TimelineResult<Self> {
        let ivaldi_dir = ivaldi_dir.into();
        let heads_file: HeadsFile = read_json(&ivaldi_dir.join("HEADS.json"))?;
        let meta_file: MetaFile =
            read_json_or(&ivaldi_dir.join("timelines").join("config.json"), || {
                MetaFile {
                    timelines: BTreeMap::new(),
                }
            })?;
        Ok(Self {
            ivaldi_dir,
            current: heads_file.current,
            heads: heads_file.heads,
            meta: meta_file.timelines,
        })
    }

    /// Persist both files atomically.
    pub fn save(&self) -> TimelineResult<()> {
        write_json(
            &self.ivaldi_dir.join("HEADS.json"),
            &HeadsFile {
                current: self.current.clone(),
                heads: self.heads.clone(),
            },
        )?;
        write_json(
            &self.ivaldi_dir.join("timelines").join("config.json"),
            &MetaFile {
                timelines: self.meta.clone(),
            },
        )?;
        Ok(())
    }

    /// The current timeline's name.
    pub fn current(&self) -> &str {
        &self.current
    }

    /// The current timeline's head (zero if nothing sealed yet).
    pub fn current_head(&self) -> Hash {
        self.heads.get(&self.current).copied().unwrap_or(Hash::ZERO)
    }

    /// Head of a named timeline.
    pub fn head_of(&self, name: &str) -> TimelineResult<Hash> {
        self.heads
            .get(name)
            .copied()
            .ok_or_else(|| TimelineError::NotFound(name.to_string()))
    }

    /// Returns `true` if the timeline exists.
    pub fn exists(&self, name: &str) -> bool {
        self.heads.contains_key(name)
    }

    /// All timeline names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.heads.keys().map(String::as_str).collect()
    }

    /// Metadata for a timeline, if any was recorded.
    pub fn metadata(&self, name: &str) -> Option<&Timeline> {
        self.meta.get(name)
    }

    /// Create a timeline branching from the current one.
    ///
    /// The new head starts at the current timeline's head, which may still
    /// be zero in a freshly forged repository.
    pub fn create(&mut self, name: &str, description: impl Into<String>) -> TimelineResult<()> {
        validate_timeline_name(name)?;
        if self.exists(name) {
            return Err(TimelineError::AlreadyExists(name.to_string()));
        }
        let now = now_nanos();
        self.heads.insert(name.to_string(), self.current_head());
        self.meta.insert(
            name.to_string(),
            Timeline {
                name: name.to_string(),
                created_at: now,
                updated_at: now,
                description: description.into(),
                parent_timeline: Some(self.current.clone()),
            },
        );
        self.save()?;
        info!(timeline = name, parent = %self.current, "timeline created");
        Ok(())
    }

    /// Delete a timeline. Refuses `main` and the current timeline.
    pub fn delete(&mut self, name: &str) -> TimelineResult<()> {
        if name == "main" {
            return Err(TimelineError::CannotDeleteMain);
        }
        if name == self.current {
            return Err(TimelineError::CannotDeleteCurrent(name.to_string()));
        }
        if self.heads.remove(name).is_none() {
            return Err(TimelineError::NotFound(name.to_string()));
        }
        self.meta.remove(name);
        self.save()?;
        info!(timeline = name, "timeline deleted");
        Ok(())
    }

    /// Point the current pointer at an existing timeline.
    pub fn set_current(&mut self, name: &str) -> TimelineResult<()> {
        if !self.exists(name) {
            return Err(TimelineError::NotFound(name.to_string()));
        }
        self.current = name.to_string();
        self.save()?;
        debug!(timeline = name, "current timeline updated");
        Ok(())
    }

    /// Advance a timeline's head after a successful seal.
    pub fn update_head(&mut self, name: &str, head: Hash) -> TimelineResult<()> {
        if !self.heads.contains_key(name) {
            return Err(TimelineError::NotFound(name.to_string()));
        }
        self.heads.insert(name.to_string(), head);
        if let Some(meta) = self.meta.get_mut(name) {
            meta.updated_at = now_nanos();
        }
        self.save()?;
        debug!(timeline = name, head = %head.short(), "head updated");
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> TimelineResult<T> {
    let bytes = fs::read(path).map_err(|e| TimelineError::io("read", path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| TimelineError::State(e.to_string()))
}

fn read_json_or<T: DeserializeOwned>(path: &Path, default: impl FnOnce() -> T) -> TimelineResult<T> {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| TimelineError::State(e.to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(default()),
        Err(e) => Err(TimelineError::io("read", path, e)),
    }
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> TimelineResult<()> {
    let parent = path.parent().expect("state path always has a parent");
    fs::create_dir_all(parent).map_err(|e| TimelineError::io("create_dir", parent, e))?;
    let json =
        serde_json::to_vec_pretty(value).map_err(|e| TimelineError::State(e.to_string()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| TimelineError::io("create_temp", parent, e))?;
    tmp.write_all(&json)
        .map_err(|e| TimelineError::io("write", tmp.path().to_path_buf(), e))?;
    tmp.persist(path)
        .map_err(|e| TimelineError::io("rename", path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, TimelineManager) {
        let dir = tempfile::tempdir().unwrap();
        let mgr = TimelineManager::init(dir.path().join(".ivaldi")).unwrap();
        (dir, mgr)
    }

    #[test]
    fn init_creates_main() {
        let (_dir, mgr) = setup();
        assert_eq!(mgr.current(), "main");
        assert!(mgr.current_head().is_zero());
        assert!(mgr.exists("main"));
        assert!(mgr.metadata("main").is_some());
    }

    #[test]
    fn create_branches_from_current_head() {
        let (_dir, mut mgr) = setup();
        let head = Hash::blake3(b"seal one");
        mgr.update_head("main", head).unwrap();

        mgr.create("feature", "try something").unwrap();
        assert_eq!(mgr.head_of("feature").unwrap(), head);
        assert_eq!(
            mgr.metadata("feature").unwrap().parent_timeline.as_deref(),
            Some("main")
        );
    }

    #[test]
    fn create_duplicate_fails() {
        let (_dir, mut mgr) = setup();
        mgr.create("feature", "").unwrap();
        assert!(matches!(
            mgr.create("feature", ""),
            Err(TimelineError::AlreadyExists(_))
        ));
    }

    #[test]
    fn create_reserved_or_invalid_fails() {
        let (_dir, mut mgr) = setup();
        assert!(matches!(
            mgr.create("HEAD", ""),
            Err(TimelineError::Invalid(_))
        ));
        assert!(matches!(
            mgr.create("bad name", ""),
            Err(TimelineError::Invalid(_))
        ));
    }

    #[test]
    fn delete_rules() {
        let (_dir, mut mgr) = setup();
        mgr.create("feature", "").unwrap();

        assert!(matches!(
            mgr.delete("main"),
            Err(TimelineError::CannotDeleteMain)
        ));
        mgr.set_current("feature").unwrap();
        assert!(matches!(
            mgr.delete("feature"),
            Err(TimelineError::CannotDeleteCurrent(_))
        ));
        mgr.set_current("main").unwrap();
        mgr.delete("feature").unwrap();
        assert!(!mgr.exists("feature"));
        assert!(matches!(
            mgr.delete("feature"),
            Err(TimelineError::NotFound(_))
        ));
    }

    #[test]
    fn set_current_requires_existence() {
        let (_dir, mut mgr) = setup();
        assert!(matches!(
            mgr.set_current("ghost"),
            Err(TimelineError::NotFound(_))
        ));
    }

    #[test]
    fn update_head_and_reload() {
        let (dir, mut mgr) = setup();
        let head = Hash::blake3(b"sealed");
        mgr.update_head("main", head).unwrap();

        let reloaded = TimelineManager::load(dir.path().join(".ivaldi")).unwrap();
        assert_eq!(reloaded.current(), "main");
        assert_eq!(reloaded.current_head(), head);
    }

    #[test]
    fn heads_file_format() {
        let (dir, mut mgr) = setup();
        mgr.update_head("main", Hash::blake3(b"x")).unwrap();
        let raw = fs::read_to_string(dir.path().join(".ivaldi/HEADS.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["current"], "main");
        assert!(parsed["heads"]["main"].as_str().unwrap().starts_with("blake3:"));
    }

    #[test]
    fn update_head_of_missing_timeline_fails() {
        let (_dir, mut mgr) = setup();
        assert!(matches!(
            mgr.update_head("ghost", Hash::blake3(b"x")),
            Err(TimelineError::NotFound(_))
        ));
    }
}
