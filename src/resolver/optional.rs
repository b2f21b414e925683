use super::{Resolver, ResolverRef};
use crate::core::DepfetchError;
use crate::dependency::Dependency;
use anyhow::Result;
use std::path::PathBuf;
use std::rc::Rc;

/// Fails when a non-optional dependency ends up without a path.
pub struct OptionalResolver {
    dep: Rc<Dependency>,
    inner: ResolverRef,
}

impl OptionalResolver {
    /// Enforce the dependency's `optional` flag on `inner`.
    #[must_use]
    pub fn new(dep: Rc<Dependency>, inner: ResolverRef) -> Self {
        Self {
            dep,
            inner,
        }
    }
}

impl Resolver for OptionalResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        let path = self.inner.resolve()?;
        if path.is_none() && !self.dep.optional() {
            let sources = self.dep.sources().len();
            return Err(DepfetchError::RequiredDependency {
                name: self.dep.name(),
                reason: format!("none of the {sources} declared source(s) produced a path"),
                errors: self.dep.error_messages(),
            }
            .into());
        }
        Ok(path)
    }
}

/// Fails whenever `inner` comes back empty, regardless of the `optional` flag.
///
/// Wraps resolutions the user asked for explicitly, such as a `<name>_path` override.
pub struct MandatoryResolver {
    dep: Rc<Dependency>,
    message: String,
    inner: ResolverRef,
}

impl MandatoryResolver {
    /// Require `inner` to produce a path; `message` explains why.
    pub fn new(dep: Rc<Dependency>, message: impl Into<String>, inner: ResolverRef) -> Self {
        Self {
            dep,
            message: message.into(),
            inner,
        }
    }
}

impl Resolver for MandatoryResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        match self.inner.resolve()? {
            Some(path) => Ok(Some(path)),
            None => Err(DepfetchError::RequiredDependency {
                name: self.dep.name(),
                reason: self.message.clone(),
                errors: self.dep.error_messages(),
            }
            .into()),
        }
    }
}
