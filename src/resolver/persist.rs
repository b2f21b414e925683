use super::{Resolver, ResolverRef};
use crate::core::DepfetchError;
use crate::dependency::{Dependency, attr};
use crate::lockfile::ResolveRecord;
use anyhow::Result;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::debug;

/// Writes a resolve record after every successful resolution.
pub struct ActiveRecordResolver {
    dep: Rc<Dependency>,
    records_dir: PathBuf,
    inner: ResolverRef,
}

impl ActiveRecordResolver {
    /// Record results of `inner` into `records_dir`.
    pub fn new(dep: Rc<Dependency>, records_dir: impl Into<PathBuf>, inner: ResolverRef) -> Self {
        Self {
            dep,
            records_dir: records_dir.into(),
            inner,
        }
    }
}

impl Resolver for ActiveRecordResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        let path = self.inner.resolve()?;
        if let Some(path) = &path {
            let record = ResolveRecord {
                sha1: self.dep.fingerprint().to_string(),
                path: path.clone(),
            };
            record.save(&self.records_dir, &self.dep.name())?;
        }
        Ok(path)
    }
}

/// Replays the resolve record written by an earlier run instead of resolving.
///
/// A missing record gives `None`. A record written for a different declaration, or pointing at
/// a path that no longer exists, is a [`DepfetchError::StaleRecord`].
pub struct PassiveRecordResolver {
    dep: Rc<Dependency>,
    records_dir: PathBuf,
}

impl PassiveRecordResolver {
    /// Read records from `records_dir`.
    pub fn new(dep: Rc<Dependency>, records_dir: impl Into<PathBuf>) -> Self {
        Self {
            dep,
            records_dir: records_dir.into(),
        }
    }
}

impl Resolver for PassiveRecordResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        let name = self.dep.name();
        let Some(record) = ResolveRecord::load(&self.records_dir, &name)? else {
            debug!(dependency = %name, "No resolve record");
            return Ok(None);
        };

        if record.sha1 != self.dep.fingerprint() {
            return Err(DepfetchError::StaleRecord {
                name,
                reason: "the declaration changed since the record was written".to_string(),
            }
            .into());
        }
        if !record.path.exists() {
            return Err(DepfetchError::StaleRecord {
                name,
                reason: format!("recorded path {} no longer exists", record.path.display()),
            }
            .into());
        }

        self.dep.set(attr::RESOLVER_ACTION, "load")?;
        Ok(Some(record.path))
    }
}
