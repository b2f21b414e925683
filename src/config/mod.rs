//! Options of one resolution pass and the mode derived from them.
//!
//! [`Options`] carries every setting the resolver reacts to. A host can forward its raw option
//! table through [`Options::set`], which understands the generic keys:
//!
//! | Key | Meaning |
//! |---|---|
//! | `resolve_path` | cache directory for fetched dependencies |
//! | `symlinks_path` | directory of stable per-dependency links (empty disables links) |
//! | `records_path` | directory of per-dependency resolve records |
//! | `git_protocol` | protocol for protocol-less git sources (`https://`, `git@`, ...) |
//! | `lock_paths` / `lock_versions` | write a path or version lock at the end of the run |
//! | `skip_internal` | do not resolve `internal` dependencies |
//! | `load` | replay resolve records instead of resolving |
//! | `tags_url` | tag registry document |
//! | `enable` | comma separated optional dependencies to resolve |
//! | `<name>_path` | use a local folder for dependency `<name>` |
//! | `<name>_checkout` | check out a specific ref of git dependency `<name>` |
//!
//! Exact keys win over the `<name>_` patterns, so a dependency called `resolve` cannot be
//! overridden through `resolve_path`.
//!
//! [`ResolveMode::detect`] then picks the chain shape for the whole run.

pub mod global;

pub use global::GlobalConfig;

use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::DepfetchError;
use crate::git::url::SUPPORTED_PROTOCOLS;
use crate::lockfile::{PATH_LOCK_FILE, VERSION_LOCK_FILE};
use crate::utils::platform::resolve_path;

/// Default protocol for protocol-less git sources.
pub const DEFAULT_GIT_PROTOCOL: &str = "https://";

/// Settings of one resolution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Project being resolved; relative option paths are taken from here
    pub project_dir: PathBuf,
    /// Cache directory holding one `<name>-<hash>` root per dependency
    pub resolve_path: PathBuf,
    /// Directory of stable links, `None` disables the symlink step
    pub symlinks_path: Option<PathBuf>,
    /// Directory of resolve records
    pub records_path: PathBuf,
    /// Protocol used to build clone URLs
    pub git_protocol: String,
    /// Write a path lock at the end of the run
    pub lock_paths: bool,
    /// Write a version lock at the end of the run
    pub lock_versions: bool,
    /// Skip internal dependencies
    pub skip_internal: bool,
    /// Replay resolve records only
    pub load: bool,
    /// `<name>_path` overrides
    pub user_paths: BTreeMap<String, PathBuf>,
    /// `<name>_checkout` overrides
    pub user_checkouts: BTreeMap<String, String>,
    /// Optional dependencies switched on
    pub enabled: BTreeSet<String>,
    /// Tag registry document
    pub tags_url: Option<String>,
}

impl Options {
    /// Built-in defaults for `project_dir`.
    ///
    /// A relative `project_dir` is made absolute against the current directory, so cache paths
    /// and link targets stay valid wherever they are read from.
    #[must_use]
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        let project_dir = std::path::absolute(&project_dir).unwrap_or(project_dir);
        Self {
            resolve_path: project_dir.join("resolved_dependencies"),
            symlinks_path: Some(project_dir.join("resolve_symlinks")),
            records_path: project_dir.join("build").join("resolve_records"),
            git_protocol: DEFAULT_GIT_PROTOCOL.to_string(),
            lock_paths: false,
            lock_versions: false,
            skip_internal: false,
            load: false,
            user_paths: BTreeMap::new(),
            user_checkouts: BTreeMap::new(),
            enabled: BTreeSet::new(),
            tags_url: None,
            project_dir,
        }
    }

    /// Apply the values a [`GlobalConfig`] provides on top of the built-in defaults.
    pub fn apply_global(&mut self, global: &GlobalConfig) -> Result<()> {
        if let Some(path) = &global.resolve_path {
            self.resolve_path = self.project_path(path)?;
        }
        if let Some(path) = &global.symlinks_path {
            self.symlinks_path = self.optional_project_path(path)?;
        }
        if let Some(protocol) = &global.git_protocol {
            self.git_protocol.clone_from(protocol);
        }
        if global.tags_url.is_some() {
            self.tags_url.clone_from(&global.tags_url);
        }
        Ok(())
    }

    /// Set one option from its generic key.
    ///
    /// # Errors
    ///
    /// [`DepfetchError::Config`] for unknown keys and malformed values.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "resolve_path" => self.resolve_path = self.project_path(value)?,
            "symlinks_path" => self.symlinks_path = self.optional_project_path(value)?,
            "records_path" => self.records_path = self.project_path(value)?,
            "git_protocol" => self.git_protocol = value.to_string(),
            "lock_paths" => self.lock_paths = parse_bool(key, value)?,
            "lock_versions" => self.lock_versions = parse_bool(key, value)?,
            "skip_internal" => self.skip_internal = parse_bool(key, value)?,
            "load" => self.load = parse_bool(key, value)?,
            "tags_url" => self.tags_url = (!value.is_empty()).then(|| value.to_string()),
            "enable" => {
                self.enabled.extend(
                    value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
                );
            }
            _ => {
                if let Some(name) = key.strip_suffix("_path").filter(|n| !n.is_empty()) {
                    let path = self.project_path(value)?;
                    self.user_paths.insert(name.to_string(), path);
                } else if let Some(name) = key.strip_suffix("_checkout").filter(|n| !n.is_empty()) {
                    self.user_checkouts.insert(name.to_string(), value.to_string());
                } else {
                    return Err(DepfetchError::Config {
                        message: format!("unknown option '{key}'"),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Check option combinations.
    ///
    /// # Errors
    ///
    /// [`DepfetchError::Config`] when both locks are requested, when a lock is combined with
    /// `skip_internal` or `load`, or when the git protocol is not supported.
    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| -> Result<()> { Err(DepfetchError::Config { message }.into()) };

        if self.lock_paths && self.lock_versions {
            return fail("lock_paths and lock_versions cannot be used together".to_string());
        }
        if (self.lock_paths || self.lock_versions) && self.skip_internal {
            return fail(
                "a lock file must cover internal dependencies; drop skip_internal when locking"
                    .to_string(),
            );
        }
        if (self.lock_paths || self.lock_versions) && self.load {
            return fail("load replays previous results and cannot write a lock".to_string());
        }
        if !SUPPORTED_PROTOCOLS.contains(&self.git_protocol.as_str()) {
            return fail(format!(
                "unsupported git protocol '{}', expected one of {}",
                self.git_protocol,
                SUPPORTED_PROTOCOLS.join(", ")
            ));
        }
        Ok(())
    }

    /// The mode this run uses.
    #[must_use]
    pub fn mode(&self) -> ResolveMode {
        ResolveMode::detect(self)
    }

    /// Path of the version lock file.
    #[must_use]
    pub fn version_lock_file(&self) -> PathBuf {
        self.project_dir.join(VERSION_LOCK_FILE)
    }

    /// Path of the path lock file.
    #[must_use]
    pub fn path_lock_file(&self) -> PathBuf {
        self.project_dir.join(PATH_LOCK_FILE)
    }

    fn project_path(&self, value: &str) -> Result<PathBuf> {
        let expanded = resolve_path(value)?;
        Ok(if expanded.is_absolute() { expanded } else { self.project_dir.join(expanded) })
    }

    fn optional_project_path(&self, value: &str) -> Result<Option<PathBuf>> {
        if value.is_empty() {
            return Ok(None);
        }
        self.project_path(value).map(Some)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(DepfetchError::Config {
            message: format!("'{key}' expects true or false, got '{value}'"),
        }
        .into()),
    }
}

/// Chain shape used for every dependency of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveMode {
    /// Fetch and select versions interactively
    Resolve,
    /// Resolve, then write a version lock
    LockVersions,
    /// Resolve, then write a path lock
    LockPaths,
    /// Resolve pinned to the version lock
    FromVersionLock,
    /// Reuse the folders of the path lock
    FromPathLock,
    /// Replay resolve records without resolving
    Load,
}

impl ResolveMode {
    /// Pick the mode from the options and the lock files present in the project.
    ///
    /// `load` wins, then explicit lock flags, then an existing path lock, then an existing
    /// version lock.
    #[must_use]
    pub fn detect(options: &Options) -> Self {
        if options.load {
            Self::Load
        } else if options.lock_paths {
            Self::LockPaths
        } else if options.lock_versions {
            Self::LockVersions
        } else if lock_exists(&options.path_lock_file()) {
            Self::FromPathLock
        } else if lock_exists(&options.version_lock_file()) {
            Self::FromVersionLock
        } else {
            Self::Resolve
        }
    }

    /// Whether the run writes a lock file.
    #[must_use]
    pub const fn is_locking(self) -> bool {
        matches!(self, Self::LockVersions | Self::LockPaths)
    }

    /// Whether the run reads a lock file.
    #[must_use]
    pub const fn is_from_lock(self) -> bool {
        matches!(self, Self::FromVersionLock | Self::FromPathLock)
    }

    /// Stable name, recorded on each dependency as `resolver_chain`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::LockVersions => "lock_versions",
            Self::LockPaths => "lock_paths",
            Self::FromVersionLock => "from_version_lock",
            Self::FromPathLock => "from_path_lock",
            Self::Load => "load",
        }
    }
}

impl fmt::Display for ResolveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn lock_exists(path: &Path) -> bool {
    path.is_file()
}
