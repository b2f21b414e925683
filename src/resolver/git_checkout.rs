use super::{Resolver, ResolverRef};
use crate::dependency::{Dependency, attr};
use crate::git::Git;
use crate::utils::fs::{copy_dir, move_dir, remove_dir_all};
use crate::utils::folder_name;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Materializes one ref of a git source.
///
/// - the default branch is served straight from the source clone;
/// - another branch gets a branch-named folder, pulled again whenever it is reused;
/// - anything else is resolved to a commit id and gets a commit-named folder that is never
///   touched again.
///
/// With branch pinning on (version-locking runs) a branch is brought up to date as above and then
/// copied to the commit-named folder of its current commit, which is what the chain returns. A
/// later run pinned to that commit finds the same folder without touching git.
///
/// `git_commit`, `git_tag` (when the commit is tagged) and `git_is_branch` are recorded on the
/// dependency.
pub struct GitCheckoutResolver {
    git: Rc<dyn Git>,
    dep: Rc<Dependency>,
    source: ResolverRef,
    cache_root: PathBuf,
    checkout: String,
    pin_branches: bool,
}

impl GitCheckoutResolver {
    /// Check out `checkout` from the clone produced by `source`.
    pub fn new(
        git: Rc<dyn Git>,
        dep: Rc<Dependency>,
        source: ResolverRef,
        cache_root: impl Into<PathBuf>,
        checkout: impl Into<String>,
    ) -> Self {
        Self {
            git,
            dep,
            source,
            cache_root: cache_root.into(),
            checkout: checkout.into(),
            pin_branches: false,
        }
    }

    /// Return the commit folder of a branch instead of the moving branch folder.
    #[must_use]
    pub fn with_pinned_branches(mut self, pin: bool) -> Self {
        self.pin_branches = pin;
        self
    }

    /// Commit-named copy of the branch working copy at `branch_path`.
    fn pin(&self, branch_path: &Path) -> Result<PathBuf> {
        let commit = self.git.current_commit(branch_path)?;
        let pinned = self.cache_root.join(&commit);
        if !pinned.is_dir() {
            materialize(self.git.as_ref(), &self.dep, branch_path, &pinned, &commit)?;
        }
        debug!(dependency = %self.dep, branch = %self.checkout, commit = %commit, "Pinned branch to its current commit");
        Ok(pinned)
    }
}

impl Resolver for GitCheckoutResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        let Some(clone) = self.source.resolve()? else {
            return Ok(None);
        };

        let branch_folder = folder_name(&self.checkout);
        if clone.file_name().is_some_and(|name| name.to_string_lossy() == branch_folder) {
            debug!(dependency = %self.dep, "Checkout is the default branch");
            self.dep.set(attr::GIT_IS_BRANCH, true)?;
            if !self.pin_branches {
                self.dep.set(attr::RESOLVER_ACTION, "git_default_branch")?;
                record_commit(self.git.as_ref(), &self.dep, &clone)?;
                return Ok(Some(clone));
            }
            let target = self.pin(&clone)?;
            self.dep.set(attr::RESOLVER_ACTION, "git_checkout")?;
            record_commit(self.git.as_ref(), &self.dep, &target)?;
            return Ok(Some(target));
        }

        let target = if self.git.branches(&clone)?.contains(&self.checkout) {
            let target = self.cache_root.join(&branch_folder);
            if target.is_dir() {
                if let Err(error) = self.git.pull(&target) {
                    warn!(dependency = %self.dep, "Pull failed, continuing with the cached copy: {error:#}");
                }
            } else {
                materialize(self.git.as_ref(), &self.dep, &clone, &target, &self.checkout)?;
            }
            self.dep.set(attr::GIT_IS_BRANCH, true)?;
            if self.pin_branches {
                self.pin(&target)?
            } else {
                target
            }
        } else {
            let commit = self.git.rev_parse(&clone, &self.checkout)?;
            let target = self.cache_root.join(&commit);
            if !target.is_dir() {
                materialize(self.git.as_ref(), &self.dep, &clone, &target, &commit)?;
            }
            target
        };

        self.dep.set(attr::RESOLVER_ACTION, "git_checkout")?;
        record_commit(self.git.as_ref(), &self.dep, &target)?;
        Ok(Some(target))
    }
}

/// Copy `clone` to `target` and check out `reference` there.
///
/// Work happens in a hidden staging folder that is renamed into place only after the checkout
/// (and submodule update) succeeded, so `target` never holds a half-prepared tree.
pub(crate) fn materialize(
    git: &dyn Git,
    dep: &Dependency,
    clone: &Path,
    target: &Path,
    reference: &str,
) -> Result<()> {
    let parent = target.parent().unwrap_or(clone);
    let staging = parent.join(format!(".checkout-{}", Uuid::new_v4()));
    info!(dependency = %dep, reference, "Materializing checkout");

    let prepared = copy_dir(clone, &staging).and_then(|()| {
        git.checkout(&staging, reference)?;
        if dep.pull_submodules() {
            git.pull_submodules(&staging)?;
        }
        Ok(())
    });
    if let Err(error) = prepared {
        remove_dir_all(&staging)?;
        return Err(error);
    }
    move_dir(&staging, target)
}

/// Record `git_commit` and `git_tag` of the working copy at `path`.
pub(crate) fn record_commit(git: &dyn Git, dep: &Dependency, path: &Path) -> Result<()> {
    dep.set(attr::GIT_COMMIT, git.current_commit(path)?)?;
    if let Some(tag) = git.current_tag(path)? {
        dep.set(attr::GIT_TAG, tag)?;
    }
    Ok(())
}
