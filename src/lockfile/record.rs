//! Per-dependency resolve records.
//!
//! After a successful resolution the active-record node writes
//! `<records dir>/<name>.resolve.json` containing the fingerprint and the resolved path. A later
//! `load` run replays these files instead of touching the network.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::utils::fs::{read_json_file, write_json_file};

/// Contents of one resolve record file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRecord {
    /// Fingerprint of the declaration that was resolved
    pub sha1: String,
    /// Resolved path as returned by the chain
    pub path: PathBuf,
}

impl ResolveRecord {
    /// Record file of dependency `name` inside `records_dir`.
    #[must_use]
    pub fn file_for(records_dir: &Path, name: &str) -> PathBuf {
        records_dir.join(format!("{name}.resolve.json"))
    }

    /// Read the record of `name`, `None` when there is none.
    pub fn load(records_dir: &Path, name: &str) -> Result<Option<Self>> {
        let file = Self::file_for(records_dir, name);
        if !file.exists() {
            return Ok(None);
        }
        read_json_file(&file).map(Some)
    }

    /// Write the record of `name`.
    pub fn save(&self, records_dir: &Path, name: &str) -> Result<()> {
        write_json_file(&Self::file_for(records_dir, name), self, true)
    }
}
