//! Archive unpacking for http dependencies with `extract: true`.
//!
//! Supported formats are picked from the file name: `.zip`, `.tar`, `.tar.gz` and `.tgz`.
//! Extraction goes to a hidden sibling directory first and is renamed into place, so an
//! interrupted run never leaves a half-populated destination behind.

use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::Path;
use tracing::debug;

use crate::utils::fs::{ensure_parent_dir, remove_dir_all};

/// Archive formats that can be unpacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// `.zip`
    Zip,
    /// `.tar`
    Tar,
    /// `.tar.gz` or `.tgz`
    TarGz,
}

impl ArchiveFormat {
    /// Detect the format from a file name.
    #[must_use]
    pub fn detect(file_name: &str) -> Option<Self> {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

/// File name without its archive extension (`waf-2.0.tar.gz` gives `waf-2.0`).
#[must_use]
pub fn archive_stem(file_name: &str) -> String {
    let lower = file_name.to_ascii_lowercase();
    for suffix in [".tar.gz", ".tgz", ".zip", ".tar"] {
        if lower.ends_with(suffix) {
            return file_name[..file_name.len() - suffix.len()].to_string();
        }
    }
    file_name.to_string()
}

/// Unpack `archive` into `dest`, replacing anything already there.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let file_name = archive.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let Some(format) = ArchiveFormat::detect(file_name) else {
        bail!("Unsupported archive format: {}", archive.display());
    };

    let temp_dir = dest.with_file_name(format!(
        ".{}.tmp",
        dest.file_name().and_then(|s| s.to_str()).unwrap_or("extract")
    ));
    remove_dir_all(&temp_dir)?;
    ensure_parent_dir(&temp_dir)?;
    std::fs::create_dir_all(&temp_dir)?;

    debug!(archive = %archive.display(), dest = %dest.display(), ?format, "Extracting archive");

    if let Err(e) = unpack(archive, format, &temp_dir) {
        let _ = std::fs::remove_dir_all(&temp_dir);
        return Err(e);
    }

    remove_dir_all(dest)?;
    std::fs::rename(&temp_dir, dest)
        .with_context(|| format!("Failed to move extracted files to {}", dest.display()))?;
    Ok(())
}

fn unpack(archive: &Path, format: ArchiveFormat, dest: &Path) -> Result<()> {
    let file = File::open(archive)
        .with_context(|| format!("Failed to open archive: {}", archive.display()))?;

    match format {
        ArchiveFormat::Zip => {
            let mut zip = zip::ZipArchive::new(file)
                .with_context(|| format!("Failed to open zip: {}", archive.display()))?;
            zip.extract(dest)
                .with_context(|| format!("Failed to extract zip: {}", archive.display()))?;
        }
        ArchiveFormat::Tar => {
            tar::Archive::new(file)
                .unpack(dest)
                .with_context(|| format!("Failed to extract tar: {}", archive.display()))?;
        }
        ArchiveFormat::TarGz => {
            tar::Archive::new(GzDecoder::new(file))
                .unpack(dest)
                .with_context(|| format!("Failed to extract tar.gz: {}", archive.display()))?;
        }
    }
    Ok(())
}
