use super::Resolver;
use crate::dependency::{Dependency, attr};
use anyhow::Result;
use serde_json::Value;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::debug;

/// Uses a folder the user passed as `<name>_path`.
///
/// Returns `None` when the folder does not exist; the chain wraps this node in a
/// [`MandatoryResolver`](super::MandatoryResolver) so that is fatal.
pub struct UserPathResolver {
    dep: Rc<Dependency>,
    path: PathBuf,
}

impl UserPathResolver {
    /// Override `dep` with `path`.
    pub fn new(dep: Rc<Dependency>, path: impl Into<PathBuf>) -> Self {
        Self {
            dep,
            path: path.into(),
        }
    }
}

impl Resolver for UserPathResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            debug!(dependency = %self.dep, path = %self.path.display(), "User path does not exist");
            return Ok(None);
        }
        self.dep.set(attr::RESOLVER_ACTION, "user_path")?;
        Ok(Some(self.path.clone()))
    }
}

/// Rewrite a git dependency to `method = "checkout"` at `reference`.
///
/// Used for `<name>_checkout` overrides and for pinning to a version lock. A declared `major`
/// is dropped since it no longer applies.
pub fn pin_checkout(dep: &Dependency, reference: &str, reason: &str) -> Result<()> {
    if dep.method() == Some(crate::dependency::Method::Checkout)
        && dep.checkout().as_deref() == Some(reference)
    {
        return Ok(());
    }
    dep.rewrite("checkout", Some(Value::String(reference.to_string())), reason)?;
    dep.rewrite("method", Some(Value::String("checkout".to_string())), reason)?;
    if dep.is_declared("major") {
        dep.rewrite("major", None, reason)?;
    }
    Ok(())
}
