use super::{Resolver, ResolverRef, real_path};
use crate::core::DepfetchError;
use crate::dependency::{Dependency, ResolverKind, attr};
use crate::lockfile::{LockCache, PathLockEntry, VersionLockEntry, content_hash};
use crate::utils::normalize_path_for_storage;
use crate::utils::platform::{is_within, safe_canonicalize};
use anyhow::Result;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::debug;

fn lock_incomplete(dep: &Dependency, reason: impl Into<String>) -> anyhow::Error {
    DepfetchError::LockIncomplete {
        name: dep.name(),
        reason: reason.into(),
    }
    .into()
}

/// Adds a version lock entry for every successful resolution.
///
/// Git dependencies are pinned to the resolved tag, or the commit id when the checkout is not
/// tagged. Http dependencies are pinned to the content hash of the resolved file or folder.
pub struct StoreVersionLockResolver {
    dep: Rc<Dependency>,
    lock: Rc<RefCell<LockCache>>,
    inner: ResolverRef,
}

impl StoreVersionLockResolver {
    /// Store results of `inner` into `lock`.
    #[must_use]
    pub fn new(dep: Rc<Dependency>, lock: Rc<RefCell<LockCache>>, inner: ResolverRef) -> Self {
        Self {
            dep,
            lock,
            inner,
        }
    }
}

impl Resolver for StoreVersionLockResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        let Some(path) = self.inner.resolve()? else {
            return Ok(None);
        };

        let checkout = match self.dep.resolver() {
            ResolverKind::Http => content_hash(&real_path(&self.dep, path.clone()))?,
            ResolverKind::Git => self
                .dep
                .get_str(attr::GIT_TAG)
                .or_else(|| self.dep.get_str(attr::GIT_COMMIT))
                .ok_or_else(|| lock_incomplete(&self.dep, "neither a tag nor a commit id is known"))?,
        };
        debug!(dependency = %self.dep, checkout = %checkout, "Storing version lock entry");

        let mut lock = self.lock.borrow_mut();
        let versions = lock
            .version_mut()
            .ok_or_else(|| lock_incomplete(&self.dep, "no version lock is being written"))?;
        versions.insert(
            self.dep.name(),
            VersionLockEntry {
                sha1: self.dep.fingerprint().to_string(),
                checkout,
                resolver_info: self.dep.get_str(attr::RESOLVER_INFO),
            },
        );
        Ok(Some(path))
    }
}

/// Adds a path lock entry for every successful resolution.
///
/// The real folder (behind the symlink, if any) must lie inside the project; it is stored
/// relative to the project with `/` separators.
pub struct StorePathLockResolver {
    dep: Rc<Dependency>,
    lock: Rc<RefCell<LockCache>>,
    project_dir: PathBuf,
    inner: ResolverRef,
}

impl StorePathLockResolver {
    /// Store results of `inner` into `lock`, relative to `project_dir`.
    pub fn new(
        dep: Rc<Dependency>,
        lock: Rc<RefCell<LockCache>>,
        project_dir: impl Into<PathBuf>,
        inner: ResolverRef,
    ) -> Self {
        Self {
            dep,
            lock,
            project_dir: project_dir.into(),
            inner,
        }
    }
}

impl Resolver for StorePathLockResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        let Some(path) = self.inner.resolve()? else {
            return Ok(None);
        };

        let real = real_path(&self.dep, path.clone());
        if !is_within(&real, &self.project_dir)? {
            return Err(lock_incomplete(
                &self.dep,
                format!(
                    "{} is outside the project {}; set resolve_path inside the project to lock paths",
                    real.display(),
                    self.project_dir.display()
                ),
            ));
        }
        let real = safe_canonicalize(&real)?;
        let project = safe_canonicalize(&self.project_dir)?;
        let relative = real.strip_prefix(&project).unwrap_or(&real);
        let stored = normalize_path_for_storage(relative);
        debug!(dependency = %self.dep, path = %stored, "Storing path lock entry");

        let mut lock = self.lock.borrow_mut();
        let paths = lock
            .path_mut()
            .ok_or_else(|| lock_incomplete(&self.dep, "no path lock is being written"))?;
        paths.insert(
            self.dep.name(),
            PathLockEntry {
                sha1: self.dep.fingerprint().to_string(),
                path: stored,
            },
        );
        Ok(Some(path))
    }
}
