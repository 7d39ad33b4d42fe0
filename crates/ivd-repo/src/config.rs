//! Repository configuration: the user identity.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ivd_types::Identity;

use crate::error::{RepoError, RepoResult};

/// Contents of `.ivaldi/config.json`.
///
/// The file may later hold credentials, so it is written with mode 0600.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Identity used as author and committer on new seals.
    pub user: Identity,
}

impl RepoConfig {
    fn path(ivaldi_dir: &Path) -> PathBuf {
        ivaldi_dir.join("config.json")
    }

    /// Load the config file.
    pub fn load(ivaldi_dir: &Path) -> RepoResult<Self> {
        let path = Self::path(ivaldi_dir);
        let bytes = fs::read(&path).map_err(|e| RepoError::io("read", &path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| RepoError::State(e.to_string()))
    }

    /// Persist the config atomically with owner-only permissions.
    pub fn save(&self, ivaldi_dir: &Path) -> RepoResult<()> {
        let path = Self::path(ivaldi_dir);
        fs::create_dir_all(ivaldi_dir)
            .map_err(|e| RepoError::io("create_dir", ivaldi_dir, e))?;
        let json =
            serde_json::to_vec_pretty(self).map_err(|e| RepoError::State(e.to_string()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(ivaldi_dir)
            .map_err(|e| RepoError::io("create_temp", ivaldi_dir, e))?;
        tmp.write_all(&json)
            .map_err(|e| RepoError::io("write", tmp.path().to_path_buf(), e))?;
        restrict_permissions(tmp.as_file())
            .map_err(|e| RepoError::io("chmod", tmp.path().to_path_buf(), e))?;
        tmp.persist(&path)
            .map_err(|e| RepoError::io("rename", &path, e.error))?;
        Ok(())
    }
}

fn restrict_permissions(file: &fs::File) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    {
        let _ = file;
    }
    Ok(())
}
