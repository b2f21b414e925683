use super::git_checkout::{materialize, record_commit};
use super::{Resolver, ResolverRef, resolution_error};
use crate::dependency::{Dependency, attr};
use crate::git::Git;
use crate::utils::folder_name;
use crate::version::select_tag;
use anyhow::Result;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::debug;

/// Materializes the newest tag of a major version in a tag-named folder.
pub struct GitSemverResolver {
    git: Rc<dyn Git>,
    dep: Rc<Dependency>,
    source: ResolverRef,
    cache_root: PathBuf,
    major: u64,
}

impl GitSemverResolver {
    /// Select within `major` from the tags of the clone produced by `source`.
    pub fn new(
        git: Rc<dyn Git>,
        dep: Rc<Dependency>,
        source: ResolverRef,
        cache_root: impl Into<PathBuf>,
        major: u64,
    ) -> Self {
        Self {
            git,
            dep,
            source,
            cache_root: cache_root.into(),
            major,
        }
    }
}

impl Resolver for GitSemverResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        let Some(clone) = self.source.resolve()? else {
            return Ok(None);
        };

        let tags = self.git.tags(&clone)?;
        let tag = select_tag(self.major, &tags).ok_or_else(|| {
            resolution_error(
                &self.dep,
                format!("no tag with major version {} among {} tag(s)", self.major, tags.len()),
            )
        })?;
        debug!(dependency = %self.dep, tag = %tag, "Selected tag");

        let target = self.cache_root.join(folder_name(&tag));
        if !target.is_dir() {
            materialize(self.git.as_ref(), &self.dep, &clone, &target, &tag)?;
        }

        record_commit(self.git.as_ref(), &self.dep, &target)?;
        self.dep.set(attr::GIT_TAG, tag)?;
        self.dep.set(attr::RESOLVER_ACTION, "git_semver")?;
        Ok(Some(target))
    }
}
