//! Platform-specific helpers
//!
//! Small wrappers that hide the differences between Windows and Unix-like systems for the
//! few places where they matter: locating executables, running shell commands and storing
//! paths in files that may be shared across machines.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Checks if the current platform is Windows.
#[must_use]
pub const fn is_windows() -> bool {
    cfg!(windows)
}

/// Returns the git executable name for the current platform.
#[must_use]
pub const fn get_git_command() -> &'static str {
    if is_windows() {
        "git.exe"
    } else {
        "git"
    }
}

/// Returns the shell and its "execute string" flag.
///
/// - Windows: `("cmd", "/C")`
/// - Unix-like: `("sh", "-c")`
#[must_use]
pub const fn get_shell_command() -> (&'static str, &'static str) {
    if is_windows() {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    }
}

/// Expands `~` and environment variables in a user supplied path.
pub fn resolve_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path)
        .with_context(|| format!("Failed to expand path: {path}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Normalizes a path for storage in lock and record files.
///
/// Strips Windows extended-length prefixes and converts backslashes to forward slashes so
/// that the same file is produced on every platform.
#[must_use]
pub fn normalize_path_for_storage<P: AsRef<Path>>(path: P) -> String {
    let path_str = path.as_ref().to_string_lossy();

    let cleaned = if let Some(stripped) = path_str.strip_prefix(r"\\?\UNC\") {
        format!("//{stripped}")
    } else if let Some(stripped) = path_str.strip_prefix(r"\\?\") {
        stripped.to_string()
    } else {
        path_str.to_string()
    };

    cleaned.replace('\\', "/")
}

/// Canonicalizes a path, falling back to the absolute form when it does not exist yet.
pub fn safe_canonicalize(path: &Path) -> Result<PathBuf> {
    match path.canonicalize() {
        Ok(canonical) => Ok(canonical),
        Err(_) if path.is_absolute() => Ok(path.to_path_buf()),
        Err(_) => {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            Ok(cwd.join(path))
        }
    }
}

/// Returns true when `path` lies inside `base` after canonicalization.
pub fn is_within(path: &Path, base: &Path) -> Result<bool> {
    let path = safe_canonicalize(path)?;
    let base = safe_canonicalize(base)?;
    Ok(path.starts_with(base))
}
