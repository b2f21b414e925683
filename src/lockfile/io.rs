//! Loading and saving name-keyed lock maps.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::core::DepfetchError;
use crate::utils::fs::write_json_file;

/// Read a `{name: entry}` JSON map. Missing or blank files give an empty map.
pub fn load_lock_map<T: DeserializeOwned>(path: &Path) -> Result<BTreeMap<String, T>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let content = fs::read_to_string(path).with_context(|| {
        format!(
            "Cannot read lock file: {}\n\n\
                Check that the file is readable, or delete it to resolve without a lock",
            path.display()
        )
    })?;

    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    serde_json::from_str(&content).map_err(DepfetchError::from).with_context(|| {
        format!(
            "Invalid lock file: {}\n\n\
                The file may be corrupted or edited by hand. Regenerate it with \
                --lock-versions or --lock-paths",
            path.display()
        )
    })
}

/// Write a map as pretty, key-sorted JSON with a trailing newline.
pub fn save_lock_map<T: Serialize>(path: &Path, entries: &BTreeMap<String, T>) -> Result<()> {
    write_json_file(path, entries, true)
        .with_context(|| format!("Cannot write lock file: {}", path.display()))
}
