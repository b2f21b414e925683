use super::{Resolver, ResolverRef, resolution_error};
use crate::dependency::{Dependency, attr};
use crate::utils::fs::{create_dir_link, ensure_dir, is_dir_link, read_dir_link, remove_dir_link};
use anyhow::Result;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::debug;

/// Exposes the resolved folder through a stable `<symlinks_dir>/<name>` link.
///
/// The link is created on first use and re-pointed when the real folder changes (for example
/// after a new tag was selected). Junctions are used on Windows. The dependency records
/// `is_symlink = true` and `real_path`, and the link path is returned.
pub struct SymlinkResolver {
    dep: Rc<Dependency>,
    symlinks_dir: PathBuf,
    inner: ResolverRef,
}

impl SymlinkResolver {
    /// Link results of `inner` from `symlinks_dir`.
    pub fn new(dep: Rc<Dependency>, symlinks_dir: impl Into<PathBuf>, inner: ResolverRef) -> Self {
        Self {
            dep,
            symlinks_dir: symlinks_dir.into(),
            inner,
        }
    }
}

impl Resolver for SymlinkResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        let Some(real) = self.inner.resolve()? else {
            return Ok(None);
        };

        ensure_dir(&self.symlinks_dir)?;
        let link = self.symlinks_dir.join(self.dep.name());

        if is_dir_link(&link) {
            if read_dir_link(&link).as_deref() != Some(real.as_path()) {
                debug!(link = %link.display(), target = %real.display(), "Re-pointing link");
                remove_dir_link(&link)?;
                create_dir_link(&real, &link)?;
            }
        } else if link.exists() {
            return Err(resolution_error(
                &self.dep,
                format!("{} exists and is not a link; remove it to let depfetch manage it", link.display()),
            ));
        } else {
            create_dir_link(&real, &link)?;
        }

        self.dep.set(attr::IS_SYMLINK, true)?;
        self.dep.set(attr::REAL_PATH, real.to_string_lossy().into_owned())?;
        Ok(Some(link))
    }
}
