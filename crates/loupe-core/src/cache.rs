//! Per-project cache directory and index schema versioning.

use crate::{CoreError, LoupeConfig};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Bumped whenever stored records change shape. A cache written with another
/// version is wiped and rebuilt.
pub const INDEX_VERSION: &str = "2";

const VERSION_FILE: &str = "index_version";

/// Location of one project's fact stores and hash table.
#[derive(Debug, Clone)]
pub struct ProjectCache {
    /// Canonical project root
    pub root: PathBuf,
    /// `<cache base>/<slug>`
    pub dir: PathBuf,
}

impl ProjectCache {
    /// Resolve and create the cache directory for `project_root`.
    pub fn open(config: &LoupeConfig, project_root: &Path) -> Result<Self, CoreError> {
        let root = project_root
            .canonicalize()
            .map_err(|_| CoreError::InvalidPath(project_root.display().to_string()))?;
        let dir = config.cache_base()?.join(Self::slug(&root));
        std::fs::create_dir_all(&dir)?;

        Ok(Self { root, dir })
    }

    /// `<directory name>-<first 12 hex chars of sha256(path)>`
    pub fn slug(root: &Path) -> String {
        let name = root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("project");
        let digest = format!("{:x}", Sha256::digest(root.to_string_lossy().as_bytes()));
        format!("{}-{}", name, &digest[..12])
    }

    /// Make sure the cache was written by this index version.
    ///
    /// Returns `true` when the cache was wiped and needs a full rebuild.
    pub fn ensure_version(&self) -> Result<bool, CoreError> {
        let version_path = self.dir.join(VERSION_FILE);
        let current = std::fs::read_to_string(&version_path).ok();
        if current.as_deref().map(str::trim) == Some(INDEX_VERSION) {
            return Ok(false);
        }

        tracing::info!(
            dir = ?self.dir,
            found = ?current.as_deref().map(str::trim),
            expected = INDEX_VERSION,
            "Index version changed, wiping cache"
        );
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else {
                std::fs::remove_file(&path)?;
            }
        }
        std::fs::write(&version_path, INDEX_VERSION)?;
        Ok(true)
    }
}
