//! Advisory repository lock.
//!
//! One repository is owned by one process at a time; the lock file makes
//! that visible to other processes but is advisory only, so a stale lock
//! (crashed process) is taken over with a warning rather than blocking.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{RepoError, RepoResult};

/// Holds `.ivaldi/lock` for the lifetime of a [`crate::Repository`].
pub struct RepoLock {
    path: PathBuf,
}

impl RepoLock {
    /// Take the lock, replacing a stale one if present.
    pub fn acquire(ivaldi_dir: &Path) -> RepoResult<Self> {
        let path = ivaldi_dir.join("lock");
        if path.exists() {
            let holder = fs::read_to_string(&path).unwrap_or_default();
            warn!(
                holder = holder.trim(),
                "repository lock already held; assuming a stale lock and taking over"
            );
        }
        fs::write(&path, format!("{}\n", std::process::id()))
            .map_err(|e| RepoError::io("write", &path, e))?;
        debug!(path = %path.display(), "repository lock acquired");
        Ok(Self { path })
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, "failed to release repository lock");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_writes_pid_and_drop_releases() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("lock");
        {
            let _lock = RepoLock::acquire(dir.path()).unwrap();
            let contents = fs::read_to_string(&lock_path).unwrap();
            assert_eq!(contents.trim(), std::process::id().to_string());
        }
        assert!(!lock_path.exists());
    }

    #[test]
    fn stale_lock_is_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("lock"), "99999\n").unwrap();
        let _lock = RepoLock::acquire(dir.path()).unwrap();
        let contents = fs::read_to_string(dir.path().join("lock")).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }
}
