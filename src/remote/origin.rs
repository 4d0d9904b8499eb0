//! Types binding a local copy to the remote file it mirrors.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from parsing a `host:path` origin.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OriginError {
    #[error("Origin {0:?} is missing the ':' between host and path")]
    MissingSeparator(String),

    #[error("Origin {0:?} has an empty host")]
    EmptyHost(String),

    #[error("Origin {0:?} has an empty path")]
    EmptyPath(String),
}

/// The remote location a local file mirrors, written `host:remote_path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteOrigin {
    /// scp host, optionally with `user@`.
    pub host: String,
    /// Path on the remote host.
    pub remote_path: String,
}

impl RemoteOrigin {
    pub fn new(host: impl Into<String>, remote_path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            remote_path: remote_path.into(),
        }
    }

    /// Argument form understood by scp.
    pub fn spec(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RemoteOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.remote_path)
    }
}

impl FromStr for RemoteOrigin {
    type Err = OriginError;

    /// Splits at the first `:`; the path may itself contain colons.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, path) = s
            .split_once(':')
            .ok_or_else(|| OriginError::MissingSeparator(s.to_string()))?;
        if host.is_empty() {
            return Err(OriginError::EmptyHost(s.to_string()));
        }
        if path.is_empty() {
            return Err(OriginError::EmptyPath(s.to_string()));
        }
        Ok(Self::new(host, path))
    }
}

/// A local file standing in for a remote origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub local_path: PathBuf,
    pub origin: RemoteOrigin,
    /// True when the file lives in the cache and is deleted on close.
    /// False for a user's own file that was uploaded in place.
    pub managed: bool,
}

impl CacheEntry {
    pub fn managed(local_path: impl Into<PathBuf>, origin: RemoteOrigin) -> Self {
        Self {
            local_path: local_path.into(),
            origin,
            managed: true,
        }
    }

    pub fn unmanaged(local_path: impl Into<PathBuf>, origin: RemoteOrigin) -> Self {
        Self {
            local_path: local_path.into(),
            origin,
            managed: false,
        }
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }
}

/// Per-document association kept in the host's settings store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentBinding {
    pub entry: CacheEntry,
    pub is_remote_backed: bool,
}

impl DocumentBinding {
    pub fn remote(entry: CacheEntry) -> Self {
        Self {
            entry,
            is_remote_backed: true,
        }
    }

    pub fn origin(&self) -> &RemoteOrigin {
        &self.entry.origin
    }
}
