use super::{Resolver, ResolverRef};
use anyhow::Result;
use std::path::PathBuf;

/// Tries each resolver in order and returns the first present result.
pub struct ListResolver {
    resolvers: Vec<ResolverRef>,
}

impl ListResolver {
    /// List over `resolvers`, in fallback order.
    #[must_use]
    pub fn new(resolvers: Vec<ResolverRef>) -> Self {
        Self {
            resolvers,
        }
    }
}

impl Resolver for ListResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        for resolver in &self.resolvers {
            if let Some(path) = resolver.resolve()? {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}
