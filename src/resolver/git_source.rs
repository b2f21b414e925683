use super::Resolver;
use crate::dependency::{Dependency, attr};
use crate::git::Git;
use crate::utils::fs::{ensure_dir, move_dir, read_json_file, remove_dir_all, write_json_file};
use crate::utils::folder_name;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Marker in a cache root naming the default branch folder.
pub const DEFAULT_BRANCH_FILE: &str = "default_branch.json";

#[derive(Debug, Serialize, Deserialize)]
struct DefaultBranch {
    folder: String,
    branch: String,
}

/// Clones one source URL, or refreshes the existing clone.
///
/// The clone lands in a folder named after the repository's default branch inside the cache
/// root, recorded by [`DEFAULT_BRANCH_FILE`]. When that folder exists it is pulled; a failing
/// pull is only a warning so resolution can continue offline from the cached state. A marker
/// pointing at a missing folder is ignored and the clone is redone.
///
/// The result is remembered, so the checkout and semver nodes sharing this resolver trigger one
/// clone or pull per run.
pub struct GitSourceResolver {
    git: Rc<dyn Git>,
    dep: Rc<Dependency>,
    cache_root: PathBuf,
    url: String,
    resolved: RefCell<Option<PathBuf>>,
}

impl GitSourceResolver {
    /// Resolver for `url` caching under `cache_root`.
    pub fn new(
        git: Rc<dyn Git>,
        dep: Rc<Dependency>,
        cache_root: impl Into<PathBuf>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            git,
            dep,
            cache_root: cache_root.into(),
            url: url.into(),
            resolved: RefCell::new(None),
        }
    }

    fn cached_default(&self) -> Option<PathBuf> {
        let marker: DefaultBranch = read_json_file(&self.cache_root.join(DEFAULT_BRANCH_FILE)).ok()?;
        let folder = self.cache_root.join(marker.folder);
        folder.is_dir().then_some(folder)
    }

    fn clone_default(&self) -> Result<PathBuf> {
        ensure_dir(&self.cache_root)?;
        let staging = self.cache_root.join(format!(".clone-{}", Uuid::new_v4()));
        info!(dependency = %self.dep, url = %self.url, "Cloning");

        let branch = match self.clone_into(&staging) {
            Ok(branch) => branch,
            Err(error) => {
                remove_dir_all(&staging)?;
                return Err(error);
            }
        };

        let folder = folder_name(&branch);
        let target = self.cache_root.join(&folder);
        remove_dir_all(&target)?;
        move_dir(&staging, &target)?;

        if self.dep.pull_submodules() {
            self.git.pull_submodules(&target)?;
        }

        write_json_file(
            &self.cache_root.join(DEFAULT_BRANCH_FILE),
            &DefaultBranch {
                folder,
                branch,
            },
            true,
        )?;
        Ok(target)
    }

    fn clone_into(&self, staging: &Path) -> Result<String> {
        self.git.clone_repo(&self.url, staging)?;
        self.git
            .current_branch(staging)
            .with_context(|| format!("Cannot determine the default branch of {}", self.url))
    }
}

impl Resolver for GitSourceResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        if let Some(path) = self.resolved.borrow().clone() {
            return Ok(Some(path));
        }

        let path = match self.cached_default() {
            Some(folder) => {
                debug!(dependency = %self.dep, folder = %folder.display(), "Pulling cached clone");
                if let Err(error) = self.git.pull(&folder) {
                    warn!(dependency = %self.dep, "Pull failed, continuing with the cached copy: {error:#}");
                }
                folder
            }
            None => self.clone_default()?,
        };

        let origin = self.git.remote_origin_url(&path).unwrap_or_else(|_| self.url.clone());
        self.dep.set(attr::RESOLVER_INFO, origin)?;

        *self.resolved.borrow_mut() = Some(path.clone());
        Ok(Some(path))
    }
}
