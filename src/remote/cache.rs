//! Local cache layout for downloaded files.
//!
//! Structure: `{root}/{hash(remote dir)}/{remote base name}`.
//!
//! Hashing the remote directory keeps every file from one remote directory
//! in the same local subdirectory and keeps characters like `/` or `~` out of
//! local directory names. The base name is kept verbatim so editor tabs show
//! the remote file's real name.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Hex characters of the SHA-256 digest used for subdirectory names.
const SUBDIR_HASH_LEN: usize = 16;

/// Errors from cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Remote path {0:?} does not name a file")]
    NoFileName(String),

    #[error("Failed to create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write cache file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to remove cache file {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Split a POSIX remote path into directory and base name.
///
/// `/srv/app/config.yml` -> (`/srv/app`, `config.yml`), `/motd` -> (`/`, `motd`),
/// `notes.txt` -> (``, `notes.txt`).
pub fn split_remote_path(remote_path: &str) -> (&str, &str) {
    match remote_path.rsplit_once('/') {
        Some(("", base)) => ("/", base),
        Some((dir, base)) => (dir, base),
        None => ("", remote_path),
    }
}

/// Stable subdirectory name for a remote directory.
pub fn subdir_name(remote_dir: &str) -> String {
    let digest = Sha256::digest(remote_dir.as_bytes());
    let mut name = hex::encode(digest);
    name.truncate(SUBDIR_HASH_LEN);
    name
}

/// The cache tree rooted at a fixed directory.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path for `remote_path`. Pure: touches nothing on disk.
    pub fn path_for(&self, remote_path: &str) -> Result<PathBuf, CacheError> {
        let (dir, base) = split_remote_path(remote_path);
        if base.is_empty() || base == "." || base == ".." {
            return Err(CacheError::NoFileName(remote_path.to_string()));
        }
        Ok(self.root.join(subdir_name(dir)).join(base))
    }

    /// Compute the local path and create its directories.
    pub fn ensure(&self, remote_path: &str) -> Result<PathBuf, CacheError> {
        let path = self.path_for(remote_path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| CacheError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(path)
    }

    /// Write downloaded bytes to the cache, replacing any previous copy.
    pub fn store(&self, remote_path: &str, bytes: &[u8]) -> Result<PathBuf, CacheError> {
        let path = self.ensure(remote_path)?;
        fs::write(&path, bytes).map_err(|source| CacheError::Write {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "stored cache file");
        Ok(path)
    }

    /// Create the cache file if missing, leaving existing content alone.
    pub fn materialize(&self, remote_path: &str) -> Result<PathBuf, CacheError> {
        let path = self.ensure(remote_path)?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| CacheError::Write {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Remove a cache file, then its subdirectory if nothing else remains in it.
    ///
    /// A file that is already gone is not an error. Directories outside the
    /// cache root are never removed.
    pub fn evict(&self, local_path: &Path) -> Result<(), CacheError> {
        match fs::remove_file(local_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %local_path.display(), "cache file already removed");
            }
            Err(source) => {
                return Err(CacheError::Remove {
                    path: local_path.to_path_buf(),
                    source,
                });
            }
        }

        if let Some(parent) = local_path.parent()
            && parent.parent() == Some(self.root.as_path())
        {
            // Fails while sibling files from the same remote directory remain.
            if let Err(e) = fs::remove_dir(parent) {
                tracing::debug!(dir = %parent.display(), error = %e, "kept cache directory");
            }
        }
        Ok(())
    }
}
