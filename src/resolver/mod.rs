//! Composable resolver nodes.
//!
//! Every node implements [`Resolver`]: `resolve()` returns the dependency's path, `None` when the
//! node has nothing to offer, or an error. A chain is a linear stack of nodes, each holding its
//! inner resolver and adding exactly one concern before or after delegating to it.
//!
//! # Node catalogue
//!
//! Sources (innermost):
//!
//! - [`GitSourceResolver`] - clone or pull the default branch of one source URL
//! - [`GitCheckoutResolver`] - materialize a branch-, tag- or commit-named folder
//! - [`GitSemverResolver`] - materialize the newest tag of a major version
//! - [`ExistingCheckoutResolver`] / [`ExistingTagResolver`] - side-map fast paths that skip git
//! - [`HttpResolver`] - download and optionally extract
//! - [`PostResolveRunResolver`] - run declared commands in a working copy
//!
//! Composition:
//!
//! - [`ListResolver`] - first present result of several sources
//! - [`IsolateResolver`] - turns non-fatal errors into `None` and records them on the dependency
//! - [`OptionalResolver`] / [`MandatoryResolver`] - turn `None` into a fatal error
//! - [`UserPathResolver`] - a user supplied folder
//!
//! Locks and persistence:
//!
//! - [`LockVerifyResolver`], [`LockedPathResolver`], [`LockedContentResolver`] - consume a lock
//! - [`StoreVersionLockResolver`], [`StorePathLockResolver`] - fill a lock
//! - [`ActiveRecordResolver`] / [`PassiveRecordResolver`] - write or replay resolve records
//! - [`SymlinkResolver`] - stable per-dependency link
//! - [`ContextResolver`] - tracing span and outcome logging (outermost)
//!
//! The [`registry`](crate::registry) assembles these per dependency and mode.
//!
//! # Examples
//!
//! ```rust
//! use depfetch::dependency::Dependency;
//! use depfetch::resolver::{ListResolver, OptionalResolver, Resolver, ResolverRef, UserPathResolver};
//! use serde_json::json;
//! use std::rc::Rc;
//!
//! # fn example() -> anyhow::Result<()> {
//! let dep = Rc::new(Dependency::new(&json!({
//!     "name": "waf",
//!     "resolver": "http",
//!     "sources": ["https://example.com/waf.tar.gz"],
//!     "optional": true,
//! }))?);
//! let missing: ResolverRef = Rc::new(UserPathResolver::new(Rc::clone(&dep), "/does/not/exist"));
//! let chain = OptionalResolver::new(dep, Rc::new(ListResolver::new(vec![missing])));
//! assert_eq!(chain.resolve()?, None);
//! # Ok(())
//! # }
//! ```

mod context;
mod existing;
mod git_checkout;
mod git_semver;
mod git_source;
mod http;
mod isolate;
mod list;
mod lock_load;
mod lock_store;
mod optional;
mod persist;
mod post_resolve;
mod symlink;
mod user_override;

pub use context::ContextResolver;
pub use existing::{CHECKOUTS_FILE, ExistingCheckoutResolver, ExistingTagResolver, SideEntry, TAGS_FILE};
pub use git_checkout::GitCheckoutResolver;
pub use git_semver::GitSemverResolver;
pub use git_source::{DEFAULT_BRANCH_FILE, GitSourceResolver};
pub use http::HttpResolver;
pub use isolate::IsolateResolver;
pub use list::ListResolver;
pub use lock_load::{LockVerifyResolver, LockedContentResolver, LockedPathResolver};
pub use lock_store::{StorePathLockResolver, StoreVersionLockResolver};
pub use optional::{MandatoryResolver, OptionalResolver};
pub use persist::{ActiveRecordResolver, PassiveRecordResolver};
pub use post_resolve::PostResolveRunResolver;
pub use symlink::SymlinkResolver;
pub use user_override::{UserPathResolver, pin_checkout};

use crate::core::DepfetchError;
use crate::dependency::{Dependency, attr};
use anyhow::Result;
use std::path::PathBuf;
use std::rc::Rc;

/// One node of a resolver chain.
pub trait Resolver {
    /// Path of the dependency, `None` when this node has nothing to offer.
    fn resolve(&self) -> Result<Option<PathBuf>>;
}

/// Shared handle to a resolver node.
pub type ResolverRef = Rc<dyn Resolver>;

/// Non-fatal failure of one resolver step for `dep`.
pub(crate) fn resolution_error(dep: &Dependency, message: impl Into<String>) -> anyhow::Error {
    DepfetchError::Resolution {
        name: dep.name(),
        message: message.into(),
    }
    .into()
}

/// The folder behind `path`, following the symlink node's `real_path` attribute.
pub(crate) fn real_path(dep: &Dependency, path: PathBuf) -> PathBuf {
    if dep.get_bool(attr::IS_SYMLINK) == Some(true) {
        if let Some(real) = dep.get_str(attr::REAL_PATH) {
            return PathBuf::from(real);
        }
    }
    path
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::dependency::Dependency;
    use serde_json::{Value, json};
    use std::rc::Rc;

    /// A git semver dependency with optional field overrides.
    pub fn git_dep(name: &str, extra: Value) -> Rc<Dependency> {
        let mut declaration = json!({
            "name": name,
            "resolver": "git",
            "method": "semver",
            "major": 2,
            "sources": ["https://example.com/waf.git"],
        });
        if let (Some(target), Some(fields)) = (declaration.as_object_mut(), extra.as_object()) {
            target.extend(fields.clone());
        }
        Rc::new(Dependency::new(&declaration).unwrap())
    }

    /// An http dependency.
    pub fn http_dep(name: &str, extra: Value) -> Rc<Dependency> {
        let mut declaration = json!({
            "name": name,
            "resolver": "http",
            "sources": ["https://example.com/files/tool.tar.gz"],
        });
        if let (Some(target), Some(fields)) = (declaration.as_object_mut(), extra.as_object()) {
            target.extend(fields.clone());
        }
        Rc::new(Dependency::new(&declaration).unwrap())
    }
}
