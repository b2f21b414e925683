use super::{Resolver, ResolverRef};
use crate::core::DepfetchError;
use crate::dependency::{Dependency, attr};
use crate::lockfile::{LockCache, content_hash};
use anyhow::Result;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

fn lock_mismatch(dep: &Dependency, message: impl Into<String>) -> anyhow::Error {
    DepfetchError::LockMismatch {
        name: dep.name(),
        message: message.into(),
    }
    .into()
}

/// Checks the dependency against its lock entry before delegating.
///
/// A missing entry is tolerated only for optional dependencies; a fingerprint that differs
/// from the recorded one is always a [`DepfetchError::LockMismatch`].
pub struct LockVerifyResolver {
    dep: Rc<Dependency>,
    lock: Rc<RefCell<LockCache>>,
    inner: ResolverRef,
}

impl LockVerifyResolver {
    /// Verify `dep` against `lock`, then run `inner`.
    #[must_use]
    pub fn new(dep: Rc<Dependency>, lock: Rc<RefCell<LockCache>>, inner: ResolverRef) -> Self {
        Self {
            dep,
            lock,
            inner,
        }
    }
}

impl Resolver for LockVerifyResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        let recorded = self.lock.borrow().fingerprint_of(&self.dep.name()).map(str::to_string);
        match recorded {
            None if self.dep.optional() => Ok(None),
            None => Err(lock_mismatch(&self.dep, "the lock file has no entry for this dependency")),
            Some(fingerprint) if fingerprint != self.dep.fingerprint() => Err(lock_mismatch(
                &self.dep,
                "the declaration changed since the lock file was written",
            )),
            Some(_) => self.inner.resolve(),
        }
    }
}

/// Returns the folder recorded in the path lock, when it still exists.
pub struct LockedPathResolver {
    dep: Rc<Dependency>,
    lock: Rc<RefCell<LockCache>>,
    project_dir: PathBuf,
}

impl LockedPathResolver {
    /// Look `dep` up in `lock`; paths are relative to `project_dir`.
    pub fn new(dep: Rc<Dependency>, lock: Rc<RefCell<LockCache>>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            dep,
            lock,
            project_dir: project_dir.into(),
        }
    }
}

impl Resolver for LockedPathResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        let relative = {
            let lock = self.lock.borrow();
            match lock.path().and_then(|l| l.get(&self.dep.name())) {
                Some(entry) => entry.path.clone(),
                None => return Ok(None),
            }
        };

        let path = self.project_dir.join(relative);
        if !path.exists() {
            return Ok(None);
        }
        self.dep.set(attr::RESOLVER_ACTION, "locked_path")?;
        Ok(Some(path))
    }
}

/// Recomputes the content hash of an http dependency and compares it to the version lock.
pub struct LockedContentResolver {
    dep: Rc<Dependency>,
    lock: Rc<RefCell<LockCache>>,
    inner: ResolverRef,
}

impl LockedContentResolver {
    /// Check results of `inner` against the checksum stored in `lock`.
    #[must_use]
    pub fn new(dep: Rc<Dependency>, lock: Rc<RefCell<LockCache>>, inner: ResolverRef) -> Self {
        Self {
            dep,
            lock,
            inner,
        }
    }
}

impl Resolver for LockedContentResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        let Some(path) = self.inner.resolve()? else {
            return Ok(None);
        };

        let expected = self
            .lock
            .borrow()
            .version()
            .and_then(|l| l.get(&self.dep.name()))
            .map(|e| e.checkout.clone());
        if let Some(expected) = expected {
            let actual = content_hash(&path)?;
            if actual != expected {
                return Err(lock_mismatch(
                    &self.dep,
                    format!("content of {} changed: expected {expected}, found {actual}", path.display()),
                ));
            }
        }
        Ok(Some(path))
    }
}
