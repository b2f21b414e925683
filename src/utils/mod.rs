//! Cross-platform utilities used by the resolver nodes
//!
//! - [`fs`] - atomic writes, JSON/TOML files, directory copies, directory links
//! - [`platform`] - git/shell executables, path normalization for stored paths

pub mod fs;
pub mod platform;

pub use fs::{atomic_write, copy_dir, ensure_dir, read_json_file, write_json_file};
pub use platform::{get_git_command, get_shell_command, is_windows, normalize_path_for_storage};

use sha2::{Digest, Sha256};

/// Hex encoded SHA-256 of `data`.
#[must_use]
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}

/// First six hex characters of the SHA-256 of `data`, used for folder names.
#[must_use]
pub fn short_hash(data: impl AsRef<[u8]>) -> String {
    sha256_hex(data)[..6].to_string()
}

/// Make a ref, tag or branch name usable as a single folder name.
#[must_use]
pub fn folder_name(reference: &str) -> String {
    reference.replace(['/', '\\'], "_")
}
