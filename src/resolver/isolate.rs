use super::{Resolver, ResolverRef};
use crate::core::is_fatal_error;
use crate::dependency::Dependency;
use anyhow::Result;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::warn;

/// Converts non-fatal errors of one source into `None`.
///
/// The message is appended to the dependency's `error_messages` so an enclosing
/// [`OptionalResolver`](super::OptionalResolver) can report every failed source at once. Errors
/// classified as fatal by [`is_fatal_error`] pass through unchanged.
pub struct IsolateResolver {
    dep: Rc<Dependency>,
    label: String,
    inner: ResolverRef,
}

impl IsolateResolver {
    /// Isolate `inner`; `label` prefixes recorded messages (usually the source URL).
    pub fn new(dep: Rc<Dependency>, label: impl Into<String>, inner: ResolverRef) -> Self {
        Self {
            dep,
            label: label.into(),
            inner,
        }
    }
}

impl Resolver for IsolateResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        match self.inner.resolve() {
            Ok(path) => Ok(path),
            Err(error) if is_fatal_error(&error) => Err(error),
            Err(error) => {
                let message = format!("{}: {error:#}", self.label);
                warn!(dependency = %self.dep, "{message}");
                self.dep.push_error(message);
                Ok(None)
            }
        }
    }
}
