//! Directory links: symbolic links on Unix, junctions on Windows.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Creates a directory link at `link` pointing to `target`.
pub fn create_dir_link(target: &Path, link: &Path) -> Result<()> {
    super::dirs::ensure_parent_dir(link)?;

    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link).with_context(|| {
            format!("Failed to create symlink {} -> {}", link.display(), target.display())
        })?;
    }

    #[cfg(windows)]
    {
        let (shell, flag) = crate::utils::platform::get_shell_command();
        let status = std::process::Command::new(shell)
            .arg(flag)
            .arg("mklink")
            .arg("/J")
            .arg(link)
            .arg(target)
            .output()
            .with_context(|| format!("Failed to run mklink for {}", link.display()))?;
        if !status.status.success() {
            anyhow::bail!(
                "mklink /J {} {} failed: {}",
                link.display(),
                target.display(),
                String::from_utf8_lossy(&status.stderr).trim()
            );
        }
    }

    Ok(())
}

/// Returns true when `path` itself is a link (the target may be missing).
#[must_use]
pub fn is_dir_link(path: &Path) -> bool {
    fs::symlink_metadata(path).map(|m| m.file_type().is_symlink()).unwrap_or(false)
        || (cfg!(windows) && fs::read_link(path).is_ok())
}

/// Returns the target of a link, or `None` when `path` is not a link.
#[must_use]
pub fn read_dir_link(path: &Path) -> Option<PathBuf> {
    fs::read_link(path).ok()
}

/// Removes a link without touching its target. Missing links are ignored.
pub fn remove_dir_link(path: &Path) -> Result<()> {
    if fs::symlink_metadata(path).is_err() {
        return Ok(());
    }

    // Junctions are removed like directories, symlinks like files.
    let result = if cfg!(windows) { fs::remove_dir(path) } else { fs::remove_file(path) };
    result.with_context(|| format!("Failed to remove link: {}", path.display()))
}
