//! Content hashing for http-sourced dependencies.
//!
//! A file hashes to the SHA-256 of its bytes. A directory hashes every contained file, sorted by
//! its `/`-separated relative path, so the result depends only on content and layout and not on
//! where the directory lives.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::utils::normalize_path_for_storage;

/// `sha256:<hex>` of a file or directory.
pub fn content_hash(path: &Path) -> Result<String> {
    if path.is_dir() { directory_hash(path) } else { file_hash(path) }
}

fn file_hash(path: &Path) -> Result<String> {
    let content = fs::read(path)
        .with_context(|| format!("Cannot read file for content hash: {}", path.display()))?;
    Ok(format!("sha256:{}", hex::encode(Sha256::digest(&content))))
}

fn directory_hash(path: &Path) -> Result<String> {
    let mut file_hashes: Vec<(String, String)> = Vec::new();

    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry
            .with_context(|| format!("Failed to read directory entry in: {}", path.display()))?;

        if entry.file_type().is_file() {
            let file_path = entry.path();
            let relative = normalize_path_for_storage(file_path.strip_prefix(path).unwrap_or(file_path));
            file_hashes.push((relative, file_hash(file_path)?));
        }
    }

    file_hashes.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (relative, hash) in &file_hashes {
        hasher.update(format!("{relative}:{hash}\n").as_bytes());
    }
    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}
