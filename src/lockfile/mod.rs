//! Lock files pinning resolution outcomes.
//!
//! Two mutually exclusive locks exist, both name-keyed maps persisted as canonical JSON
//! (sorted keys, pretty-printed, trailing newline):
//!
//! - the **version lock** (`lock_version_resolve.json`) pins each dependency to a checkout ref
//!   (tag if known, otherwise commit id; a content hash for http dependencies):
//!
//!   ```json
//!   {
//!     "waf": {
//!       "checkout": "2.0.24",
//!       "sha1": "5d1f..."
//!     }
//!   }
//!   ```
//!
//! - the **path lock** (`lock_path_resolve.json`) pins each dependency to a folder inside the
//!   project, stored relative to the project directory with `/` separators:
//!
//!   ```json
//!   {
//!     "waf": {
//!       "path": "resolved_dependencies/waf-1a2b3c/2.0.24",
//!       "sha1": "5d1f..."
//!     }
//!   }
//!   ```
//!
//! During a run a lock is a plain in-memory map held by [`LockCache`]. Locking runs write it at
//! the end; lock-consuming runs read it at the start. `sha1` holds the dependency fingerprint.
//!
//! Per-dependency resolve records ([`record`]) use the same io helpers.

pub mod checksum;
pub mod io;
pub mod record;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub use checksum::content_hash;
pub use record::ResolveRecord;

/// File name of the version lock inside the project directory.
pub const VERSION_LOCK_FILE: &str = "lock_version_resolve.json";

/// File name of the path lock inside the project directory.
pub const PATH_LOCK_FILE: &str = "lock_path_resolve.json";

/// One dependency pinned to a checkout ref.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionLockEntry {
    /// Fingerprint of the declaration that produced the entry
    pub sha1: String,
    /// Tag, commit id or content hash
    pub checkout: String,
    /// Free-form provenance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolver_info: Option<String>,
}

/// One dependency pinned to a project-relative folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathLockEntry {
    /// Fingerprint of the declaration that produced the entry
    pub sha1: String,
    /// Folder relative to the project directory, `/` separated
    pub path: String,
}

/// Name-keyed version lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionLock {
    entries: BTreeMap<String, VersionLockEntry>,
}

/// Name-keyed path lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathLock {
    entries: BTreeMap<String, PathLockEntry>,
}

macro_rules! lock_map {
    ($lock:ty, $entry:ty) => {
        impl $lock {
            /// Empty lock.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Read a lock file; a missing or empty file gives an empty lock.
            pub fn load(path: &Path) -> Result<Self> {
                Ok(Self {
                    entries: io::load_lock_map(path)?,
                })
            }

            /// Write the lock file atomically in canonical form.
            pub fn save(&self, path: &Path) -> Result<()> {
                io::save_lock_map(path, &self.entries)
            }

            /// Entry recorded for `name`.
            #[must_use]
            pub fn get(&self, name: &str) -> Option<&$entry> {
                self.entries.get(name)
            }

            /// Record or replace the entry for `name`.
            pub fn insert(&mut self, name: impl Into<String>, entry: $entry) {
                self.entries.insert(name.into(), entry);
            }

            /// Number of locked dependencies.
            #[must_use]
            pub fn len(&self) -> usize {
                self.entries.len()
            }

            /// Whether nothing is locked.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.entries.is_empty()
            }

            /// Entries in name order.
            pub fn iter(&self) -> impl Iterator<Item = (&String, &$entry)> {
                self.entries.iter()
            }
        }
    };
}

lock_map!(VersionLock, VersionLockEntry);
lock_map!(PathLock, PathLockEntry);

/// The lock in use for the current run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LockCache {
    /// No lock involved
    #[default]
    None,
    /// Version lock being written or consumed
    Version(VersionLock),
    /// Path lock being written or consumed
    Path(PathLock),
}

impl LockCache {
    /// The version lock, if that is the active kind.
    #[must_use]
    pub fn version(&self) -> Option<&VersionLock> {
        match self {
            Self::Version(lock) => Some(lock),
            _ => None,
        }
    }

    /// Mutable version lock, if that is the active kind.
    pub fn version_mut(&mut self) -> Option<&mut VersionLock> {
        match self {
            Self::Version(lock) => Some(lock),
            _ => None,
        }
    }

    /// The path lock, if that is the active kind.
    #[must_use]
    pub fn path(&self) -> Option<&PathLock> {
        match self {
            Self::Path(lock) => Some(lock),
            _ => None,
        }
    }

    /// Mutable path lock, if that is the active kind.
    pub fn path_mut(&mut self) -> Option<&mut PathLock> {
        match self {
            Self::Path(lock) => Some(lock),
            _ => None,
        }
    }

    /// Fingerprint recorded for `name` by whichever lock is active.
    #[must_use]
    pub fn fingerprint_of(&self, name: &str) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Version(lock) => lock.get(name).map(|e| e.sha1.as_str()),
            Self::Path(lock) => lock.get(name).map(|e| e.sha1.as_str()),
        }
    }

    /// Write the active lock into `project_dir` under its standard file name.
    pub fn save_in(&self, project_dir: &Path) -> Result<()> {
        match self {
            Self::None => Ok(()),
            Self::Version(lock) => lock.save(&project_dir.join(VERSION_LOCK_FILE)),
            Self::Path(lock) => lock.save(&project_dir.join(PATH_LOCK_FILE)),
        }
    }
}
