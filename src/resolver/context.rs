use super::{Resolver, ResolverRef};
use crate::config::ResolveMode;
use crate::dependency::{Dependency, attr};
use anyhow::Result;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, info, info_span};

/// Outermost node: opens the per-dependency tracing span and logs the outcome.
pub struct ContextResolver {
    dep: Rc<Dependency>,
    mode: ResolveMode,
    inner: ResolverRef,
}

impl ContextResolver {
    /// Wrap the chain of `dep` built for `mode`.
    #[must_use]
    pub fn new(dep: Rc<Dependency>, mode: ResolveMode, inner: ResolverRef) -> Self {
        Self {
            dep,
            mode,
            inner,
        }
    }
}

impl Resolver for ContextResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        let span = info_span!("resolve", dependency = %self.dep, mode = %self.mode);
        let _entered = span.enter();

        self.dep.set(attr::RESOLVER_CHAIN, self.mode.as_str())?;
        let result = self.inner.resolve();
        match &result {
            Ok(Some(path)) => info!(
                path = %path.display(),
                action = self.dep.get_str(attr::RESOLVER_ACTION).unwrap_or_default(),
                "Resolved"
            ),
            Ok(None) => info!("Not resolved"),
            Err(error) => debug!("Resolution failed: {error:#}"),
        }
        result
    }
}
