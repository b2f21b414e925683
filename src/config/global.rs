//! User-wide defaults stored in `~/.depfetch/config.toml`.
//!
//! ```toml
//! # Keep all checkouts in one place across projects
//! resolve_path = "~/.cache/depfetch/resolved"
//! git_protocol = "git@"
//! tags_url = "https://tags.example.com/tags.json"
//! ```
//!
//! Values here are the lowest-priority layer: built-in defaults < global config < environment
//! variables < command-line flags. Paths may use `~` and environment variables.
//!
//! The location can be overridden with `DEPFETCH_CONFIG_PATH`, which tests use to stay away
//! from the real home directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::utils::fs::{atomic_write, read_toml_file};

/// Environment variable overriding the global config location.
pub const CONFIG_PATH_ENV: &str = "DEPFETCH_CONFIG_PATH";

/// Contents of the global config file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Default cache directory for resolved dependencies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve_path: Option<String>,

    /// Default directory for stable dependency symlinks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symlinks_path: Option<String>,

    /// Default protocol for protocol-less git sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_protocol: Option<String>,

    /// Tag registry document consulted before touching git
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags_url: Option<String>,
}

impl GlobalConfig {
    /// Load from the default location; a missing file gives the defaults.
    pub fn load() -> Result<Self> {
        Self::load_with_optional(None)
    }

    /// Load from `path`, falling back to [`default_path`](Self::default_path).
    pub fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if path.exists() { Self::load_from(&path) } else { Ok(Self::default()) }
    }

    /// Load from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self> {
        read_toml_file(path)
            .with_context(|| format!("Failed to load global config from {}", path.display()))
    }

    /// Write to an explicit file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize global config")?;
        atomic_write(path, content.as_bytes())
            .with_context(|| format!("Failed to write global config to {}", path.display()))
    }

    /// Config file location: `DEPFETCH_CONFIG_PATH`, else `~/.depfetch/config.toml`
    /// (`%LOCALAPPDATA%\depfetch\config.toml` on Windows).
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("depfetch")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".depfetch")
        };

        Ok(config_dir.join("config.toml"))
    }
}
