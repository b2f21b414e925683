//! In-memory source-control collaborator.
//!
//! Remotes are plain maps of branches and tags to commit ids. A "clone" is a directory with a
//! `.fake-git.json` marker naming the remote, the checked out branch and the commit, plus a
//! `REVISION` file holding the commit id. Copying a working copy with
//! [`copy_dir`](crate::utils::fs::copy_dir) therefore behaves like a second clone, which is what
//! the checkout resolvers rely on.

use crate::core::DepfetchError;
use crate::git::Git;
use crate::utils::fs::{atomic_write, ensure_dir, read_json_file, write_json_file};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Marker file written into every fake working copy.
pub const MARKER_FILE: &str = ".fake-git.json";

/// A remote repository: branches and tags pointing at commit ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeRemote {
    /// Branch checked out by a fresh clone
    pub default_branch: String,
    /// Branch name to commit id
    pub branches: BTreeMap<String, String>,
    /// Tag name to commit id
    pub tags: BTreeMap<String, String>,
    /// Commits reachable only by id
    pub commits: BTreeSet<String>,
}

impl FakeRemote {
    /// Remote whose default branch points at `commit`.
    #[must_use]
    pub fn new(default_branch: &str, commit: &str) -> Self {
        Self {
            default_branch: default_branch.to_string(),
            branches: BTreeMap::from([(default_branch.to_string(), commit.to_string())]),
            tags: BTreeMap::new(),
            commits: BTreeSet::new(),
        }
    }

    /// Add or move a branch.
    #[must_use]
    pub fn branch(mut self, name: &str, commit: &str) -> Self {
        self.branches.insert(name.to_string(), commit.to_string());
        self
    }

    /// Add a tag.
    #[must_use]
    pub fn tag(mut self, name: &str, commit: &str) -> Self {
        self.tags.insert(name.to_string(), commit.to_string());
        self
    }

    /// Add a commit only reachable by its id.
    #[must_use]
    pub fn commit(mut self, id: &str) -> Self {
        self.commits.insert(id.to_string());
        self
    }

    fn resolve_ref(&self, reference: &str) -> Option<String> {
        if let Some(commit) = self.branches.get(reference).or_else(|| self.tags.get(reference)) {
            return Some(commit.clone());
        }
        let known = self.commits.contains(reference)
            || self.branches.values().any(|c| c == reference)
            || self.tags.values().any(|c| c == reference);
        known.then(|| reference.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WorkingCopy {
    url: String,
    branch: Option<String>,
    commit: String,
}

/// Fake [`Git`] collaborator with per-operation call counters.
///
/// # Examples
///
/// ```rust
/// use depfetch::test_utils::{FakeGit, FakeRemote};
///
/// let git = FakeGit::new().with_remote(
///     "https://example.com/waf.git",
///     FakeRemote::new("main", "c1").tag("2.0.0", "c1"),
/// );
/// assert_eq!(git.fetch_calls(), 0);
/// ```
#[derive(Debug, Default)]
pub struct FakeGit {
    remotes: RefCell<BTreeMap<String, FakeRemote>>,
    unreachable: RefCell<BTreeSet<String>>,
    offline: Cell<bool>,
    calls: RefCell<BTreeMap<&'static str, usize>>,
}

impl FakeGit {
    /// No remotes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a remote under its clone URL.
    #[must_use]
    pub fn with_remote(self, url: &str, remote: FakeRemote) -> Self {
        self.set_remote(url, remote);
        self
    }

    /// Add or replace a remote, e.g. to move a branch between runs.
    pub fn set_remote(&self, url: &str, remote: FakeRemote) {
        self.remotes.borrow_mut().insert(url.to_string(), remote);
    }

    /// Make clones of `url` fail.
    pub fn set_unreachable(&self, url: &str) {
        self.unreachable.borrow_mut().insert(url.to_string());
    }

    /// Make every pull fail.
    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    /// Number of calls to one operation (`clone`, `pull`, `checkout`, `tags`, ...).
    #[must_use]
    pub fn calls(&self, operation: &str) -> usize {
        self.calls.borrow().get(operation).copied().unwrap_or(0)
    }

    /// Calls that would touch the network (clone and pull).
    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.calls("clone") + self.calls("pull")
    }

    /// Calls of any operation.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls.borrow().values().sum()
    }

    fn count(&self, operation: &'static str) {
        *self.calls.borrow_mut().entry(operation).or_insert(0) += 1;
    }

    fn remote(&self, url: &str) -> Result<FakeRemote> {
        self.remotes.borrow().get(url).cloned().ok_or_else(|| {
            DepfetchError::GitCommandError {
                operation: "fetch".to_string(),
                stderr: format!("fatal: repository '{url}' not found"),
            }
            .into()
        })
    }

    fn read_copy(dir: &Path) -> Result<WorkingCopy> {
        read_json_file(&dir.join(MARKER_FILE))
            .with_context(|| format!("{} is not a fake working copy", dir.display()))
    }

    fn write_copy(dir: &Path, copy: &WorkingCopy) -> Result<()> {
        write_json_file(&dir.join(MARKER_FILE), copy, true)?;
        atomic_write(&dir.join("REVISION"), copy.commit.as_bytes())
    }
}

impl Git for FakeGit {
    fn clone_repo(&self, url: &str, target: &Path) -> Result<()> {
        self.count("clone");
        if self.unreachable.borrow().contains(url) {
            return Err(DepfetchError::GitCloneFailed {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            }
            .into());
        }
        let remote = self.remote(url).map_err(|e| DepfetchError::GitCloneFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        ensure_dir(target)?;
        let commit = remote.branches.get(&remote.default_branch).cloned().unwrap_or_default();
        Self::write_copy(
            target,
            &WorkingCopy {
                url: url.to_string(),
                branch: Some(remote.default_branch),
                commit,
            },
        )
    }

    fn pull(&self, dir: &Path) -> Result<()> {
        self.count("pull");
        if self.offline.get() {
            return Err(DepfetchError::NetworkError {
                operation: "pull".to_string(),
                reason: "network is unreachable".to_string(),
            }
            .into());
        }
        let mut copy = Self::read_copy(dir)?;
        let remote = self.remote(&copy.url)?;
        if let Some(commit) = copy.branch.as_ref().and_then(|b| remote.branches.get(b)) {
            copy.commit.clone_from(commit);
            Self::write_copy(dir, &copy)?;
        }
        Ok(())
    }

    fn checkout(&self, dir: &Path, reference: &str) -> Result<()> {
        self.count("checkout");
        let mut copy = Self::read_copy(dir)?;
        let remote = self.remote(&copy.url)?;
        let commit = remote.resolve_ref(reference).ok_or_else(|| DepfetchError::GitCheckoutFailed {
            reference: reference.to_string(),
            reason: format!("pathspec '{reference}' did not match"),
        })?;
        copy.branch = remote.branches.contains_key(reference).then(|| reference.to_string());
        copy.commit = commit;
        Self::write_copy(dir, &copy)
    }

    fn tags(&self, dir: &Path) -> Result<Vec<String>> {
        self.count("tags");
        let copy = Self::read_copy(dir)?;
        Ok(self.remote(&copy.url)?.tags.into_keys().collect())
    }

    fn branches(&self, dir: &Path) -> Result<Vec<String>> {
        self.count("branches");
        let copy = Self::read_copy(dir)?;
        Ok(self.remote(&copy.url)?.branches.into_keys().collect())
    }

    fn current_branch(&self, dir: &Path) -> Result<String> {
        self.count("current_branch");
        Self::read_copy(dir)?.branch.ok_or_else(|| {
            DepfetchError::GitCommandError {
                operation: "branch --show-current".to_string(),
                stderr: "HEAD is detached".to_string(),
            }
            .into()
        })
    }

    fn current_commit(&self, dir: &Path) -> Result<String> {
        self.count("current_commit");
        Ok(Self::read_copy(dir)?.commit)
    }

    fn rev_parse(&self, dir: &Path, reference: &str) -> Result<String> {
        self.count("rev_parse");
        let copy = Self::read_copy(dir)?;
        self.remote(&copy.url)?.resolve_ref(reference).ok_or_else(|| {
            DepfetchError::GitCommandError {
                operation: format!("rev-parse {reference}"),
                stderr: format!("fatal: unknown revision '{reference}'"),
            }
            .into()
        })
    }

    fn current_tag(&self, dir: &Path) -> Result<Option<String>> {
        self.count("current_tag");
        let copy = Self::read_copy(dir)?;
        let remote = self.remote(&copy.url)?;
        Ok(remote.tags.into_iter().find(|(_, commit)| *commit == copy.commit).map(|(tag, _)| tag))
    }

    fn is_detached_head(&self, dir: &Path) -> Result<bool> {
        self.count("is_detached_head");
        Ok(Self::read_copy(dir)?.branch.is_none())
    }

    fn pull_submodules(&self, dir: &Path) -> Result<()> {
        self.count("pull_submodules");
        Self::read_copy(dir).map(|_| ())
    }

    fn remote_origin_url(&self, dir: &Path) -> Result<String> {
        self.count("remote_origin_url");
        Ok(Self::read_copy(dir)?.url)
    }
}
