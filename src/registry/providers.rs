//! Providers assembling the resolver chain of one dependency.
//!
//! Per-run collaborators and settings are bound as values by [`register_defaults`]. The current
//! dependency ([`DEPENDENCY`]) and, while one source is being built, the source string
//! ([`SOURCE`]) are temporaries pushed by the caller. Providers that depend on them are cached
//! per distinct dependency and source.
//!
//! Source nodes are picked by matching on [`SourceKind`], never by composing key names.

use super::{Args, CacheMode, Key, Registry, Temporary};
use crate::config::{Options, ResolveMode};
use crate::dependency::{Dependency, Method, ResolverKind};
use crate::git::Git;
use crate::git::url::clone_url;
use crate::http::Http;
use crate::lockfile::{LockCache, PathLock, VersionLock};
use crate::manager::Collaborators;
use crate::resolver::{
    ActiveRecordResolver, ContextResolver, ExistingCheckoutResolver, ExistingTagResolver,
    GitCheckoutResolver, GitSemverResolver, GitSourceResolver, HttpResolver, IsolateResolver,
    ListResolver, LockVerifyResolver, LockedContentResolver, LockedPathResolver,
    MandatoryResolver, OptionalResolver, PassiveRecordResolver, PostResolveRunResolver,
    ResolverRef, StorePathLockResolver, StoreVersionLockResolver, SymlinkResolver,
    UserPathResolver, resolution_error,
};
use crate::tags::TagRegistry;
use crate::utils::short_hash;
use anyhow::Result;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

/// Run options.
pub const OPTIONS: Key<Rc<Options>> = Key::new("options");
/// Mode of the run.
pub const MODE: Key<ResolveMode> = Key::new("mode");
/// Source-control collaborator.
pub const GIT: Key<Rc<dyn Git>> = Key::new("git");
/// Download collaborator.
pub const HTTP: Key<Rc<dyn Http>> = Key::new("http");
/// Tag registry collaborator.
pub const TAGS: Key<Rc<dyn TagRegistry>> = Key::new("tags");
/// Lock read or written by this run.
pub const LOCK_CACHE: Key<Rc<RefCell<LockCache>>> = Key::new("lock_cache");

/// Dependency whose chain is being built (temporary).
pub const DEPENDENCY: Key<Rc<Dependency>> = Key::new("dependency");
/// Declared source being built (temporary).
pub const SOURCE: Key<String> = Key::new("source");

/// `<resolve_path>/<name>-<hash6 of source>`.
pub const CACHE_ROOT: Key<PathBuf> = Key::new("cache_root");
/// Clone URL of the current source under the configured protocol.
pub const GIT_URL: Key<String> = Key::new("git_url");
/// Default-branch clone of the current source.
pub const GIT_SOURCE: Key<ResolverRef> = Key::new("git_source");
/// Checkout node of the current source, behind its side-map fast path.
pub const GIT_CHECKOUT: Key<ResolverRef> = Key::new("git_checkout");
/// Semver node of the current source, behind its side-map fast path.
pub const GIT_SEMVER: Key<ResolverRef> = Key::new("git_semver");
/// Download node of the current source.
pub const HTTP_SOURCE: Key<ResolverRef> = Key::new("http_source");
/// Isolated chain of the current source.
pub const SOURCE_CHAIN: Key<ResolverRef> = Key::new("source_chain");
/// Every declared source of the dependency, in order.
pub const SOURCES: Key<ResolverRef> = Key::new("sources");
/// Complete chain of the dependency.
pub const DEPENDENCY_CHAIN: Key<ResolverRef> = Key::new("dependency_chain");

/// Which source node a dependency uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Git with an explicit ref
    GitCheckout(String),
    /// Git with the newest tag of a major version
    GitSemver(u64),
    /// Plain download
    Http,
}

impl SourceKind {
    /// Kind of `dep` as currently declared (after any checkout pinning).
    ///
    /// # Errors
    ///
    /// A resolution error when a git dependency lacks its method fields.
    pub fn of(dep: &Dependency) -> Result<Self> {
        match dep.resolver() {
            ResolverKind::Http => Ok(Self::Http),
            ResolverKind::Git => match (dep.method(), dep.checkout(), dep.major()) {
                (Some(Method::Checkout), Some(checkout), _) => Ok(Self::GitCheckout(checkout)),
                (Some(Method::Semver), _, Some(major)) => Ok(Self::GitSemver(major)),
                _ => Err(resolution_error(dep, "git dependency without a usable method")),
            },
        }
    }
}

/// Bind the run values and every chain provider.
///
/// # Errors
///
/// [`super::RegistryError::ProviderAlreadyRegistered`] when called twice on one registry.
pub fn register_defaults(
    registry: &Registry,
    options: Rc<Options>,
    collaborators: &Collaborators,
    mode: ResolveMode,
) -> Result<()> {
    registry.provide_value(OPTIONS, options)?;
    registry.provide_value(MODE, mode)?;
    registry.provide_value(GIT, Rc::clone(&collaborators.git))?;
    registry.provide_value(HTTP, Rc::clone(&collaborators.http))?;
    registry.provide_value(TAGS, Rc::clone(&collaborators.tags))?;

    registry.provide(LOCK_CACHE, &[OPTIONS.name(), MODE.name()], CacheMode::CacheOnce, |args| {
        let options = args.get(OPTIONS)?;
        let cache = match args.get(MODE)? {
            ResolveMode::LockVersions => LockCache::Version(VersionLock::new()),
            ResolveMode::LockPaths => LockCache::Path(PathLock::new()),
            ResolveMode::FromVersionLock => LockCache::Version(VersionLock::load(&options.version_lock_file())?),
            ResolveMode::FromPathLock => LockCache::Path(PathLock::load(&options.path_lock_file())?),
            ResolveMode::Resolve | ResolveMode::Load => LockCache::None,
        };
        Ok(Rc::new(RefCell::new(cache)))
    })?;

    registry.provide(
        CACHE_ROOT,
        &[OPTIONS.name(), DEPENDENCY.name(), SOURCE.name()],
        CacheMode::Cache,
        |args| {
            let dep = args.get(DEPENDENCY)?;
            let folder = format!("{}-{}", dep.name(), short_hash(args.get(SOURCE)?));
            Ok(args.get(OPTIONS)?.resolve_path.join(folder))
        },
    )?;

    registry.provide(GIT_URL, &[OPTIONS.name(), SOURCE.name()], CacheMode::Cache, |args| {
        Ok(clone_url(&args.get(SOURCE)?, &args.get(OPTIONS)?.git_protocol))
    })?;

    registry.provide(
        GIT_SOURCE,
        &[DEPENDENCY.name(), GIT.name(), CACHE_ROOT.name(), GIT_URL.name()],
        CacheMode::Cache,
        |args| {
            let node = GitSourceResolver::new(
                args.get(GIT)?,
                args.get(DEPENDENCY)?,
                args.get(CACHE_ROOT)?,
                args.get(GIT_URL)?,
            );
            Ok(Rc::new(node) as ResolverRef)
        },
    )?;

    registry.provide(
        GIT_CHECKOUT,
        &[MODE.name(), DEPENDENCY.name(), GIT.name(), CACHE_ROOT.name(), GIT_SOURCE.name()],
        CacheMode::None,
        |args| {
            let dep = args.get(DEPENDENCY)?;
            let SourceKind::GitCheckout(checkout) = SourceKind::of(&dep)? else {
                return Err(resolution_error(&dep, "not a checkout dependency"));
            };
            let root = args.get(CACHE_ROOT)?;
            // A version lock must name a folder that stays put, so branches are pinned
            let checkout_node: ResolverRef = Rc::new(
                GitCheckoutResolver::new(
                    args.get(GIT)?,
                    Rc::clone(&dep),
                    args.get(GIT_SOURCE)?,
                    root.clone(),
                    checkout.clone(),
                )
                .with_pinned_branches(args.get(MODE)? == ResolveMode::LockVersions),
            );
            Ok(Rc::new(ExistingCheckoutResolver::new(dep, root, checkout, checkout_node)) as ResolverRef)
        },
    )?;

    registry.provide(
        GIT_SEMVER,
        &[
            DEPENDENCY.name(),
            SOURCE.name(),
            GIT.name(),
            TAGS.name(),
            CACHE_ROOT.name(),
            GIT_SOURCE.name(),
        ],
        CacheMode::None,
        |args| {
            let dep = args.get(DEPENDENCY)?;
            let SourceKind::GitSemver(major) = SourceKind::of(&dep)? else {
                return Err(resolution_error(&dep, "not a semver dependency"));
            };
            let root = args.get(CACHE_ROOT)?;
            let semver_node: ResolverRef = Rc::new(GitSemverResolver::new(
                args.get(GIT)?,
                Rc::clone(&dep),
                args.get(GIT_SOURCE)?,
                root.clone(),
                major,
            ));
            Ok(Rc::new(ExistingTagResolver::new(
                dep,
                args.get(TAGS)?,
                root,
                args.get(SOURCE)?,
                major,
                semver_node,
            )) as ResolverRef)
        },
    )?;

    registry.provide(
        HTTP_SOURCE,
        &[DEPENDENCY.name(), HTTP.name(), CACHE_ROOT.name(), SOURCE.name()],
        CacheMode::None,
        |args| {
            let node = HttpResolver::new(
                args.get(HTTP)?,
                args.get(DEPENDENCY)?,
                args.get(CACHE_ROOT)?,
                args.get(SOURCE)?,
            );
            Ok(Rc::new(node) as ResolverRef)
        },
    )?;

    registry.provide(SOURCE_CHAIN, &[DEPENDENCY.name(), SOURCE.name()], CacheMode::None, |args| {
        let dep = args.get(DEPENDENCY)?;
        let source = args.get(SOURCE)?;
        let registry = args.registry();
        let mut node = match SourceKind::of(&dep)? {
            SourceKind::GitCheckout(_) => registry.require(GIT_CHECKOUT)?,
            SourceKind::GitSemver(_) => registry.require(GIT_SEMVER)?,
            SourceKind::Http => registry.require(HTTP_SOURCE)?,
        };
        let steps = dep.post_resolve();
        if !steps.is_empty() {
            node = Rc::new(PostResolveRunResolver::new(Rc::clone(&dep), steps, node));
        }
        Ok(Rc::new(IsolateResolver::new(dep, format!("source '{source}'"), node)) as ResolverRef)
    })?;

    registry.provide(SOURCES, &[DEPENDENCY.name()], CacheMode::None, |args| {
        let dep = args.get(DEPENDENCY)?;
        let registry = args.registry();
        let nodes = dep
            .sources()
            .into_iter()
            .map(|source| {
                registry.with_temporary(Temporary::new().value(SOURCE, source), |reg| reg.require(SOURCE_CHAIN))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Rc::new(ListResolver::new(nodes)) as ResolverRef)
    })?;

    registry.provide(
        DEPENDENCY_CHAIN,
        &[DEPENDENCY.name(), OPTIONS.name(), MODE.name(), LOCK_CACHE.name()],
        CacheMode::None,
        build_dependency_chain,
    )?;

    Ok(())
}

fn build_dependency_chain(args: &Args<'_>) -> Result<ResolverRef> {
    let dep = args.get(DEPENDENCY)?;
    let options = args.get(OPTIONS)?;
    let mode = args.get(MODE)?;
    let lock = args.get(LOCK_CACHE)?;
    let name = dep.name();

    if mode == ResolveMode::Load {
        let passive: ResolverRef = Rc::new(PassiveRecordResolver::new(Rc::clone(&dep), &options.records_path));
        let optional: ResolverRef = Rc::new(OptionalResolver::new(Rc::clone(&dep), passive));
        return Ok(Rc::new(ContextResolver::new(dep, mode, optional)));
    }

    let user_checkout = (dep.resolver() == ResolverKind::Git)
        .then(|| options.user_checkouts.get(&name))
        .flatten();

    let mut node: ResolverRef = if let Some(path) = options.user_paths.get(&name) {
        let user: ResolverRef = Rc::new(UserPathResolver::new(Rc::clone(&dep), path));
        Rc::new(MandatoryResolver::new(
            Rc::clone(&dep),
            format!("user path {} does not exist", path.display()),
            user,
        ))
    } else if let Some(checkout) = user_checkout {
        crate::resolver::pin_checkout(&dep, checkout, "user checkout override")?;
        let sources = args.registry().require(SOURCES)?;
        Rc::new(MandatoryResolver::new(
            Rc::clone(&dep),
            format!("user checkout '{checkout}' could not be resolved"),
            sources,
        ))
    } else if mode == ResolveMode::FromPathLock {
        let locked: ResolverRef =
            Rc::new(LockedPathResolver::new(Rc::clone(&dep), Rc::clone(&lock), &options.project_dir));
        let mandatory: ResolverRef =
            Rc::new(MandatoryResolver::new(Rc::clone(&dep), "the locked path is missing", locked));
        Rc::new(LockVerifyResolver::new(Rc::clone(&dep), Rc::clone(&lock), mandatory))
    } else {
        let mut sources = args.registry().require(SOURCES)?;
        let from_version_lock = mode == ResolveMode::FromVersionLock;
        if from_version_lock && dep.resolver() == ResolverKind::Http {
            sources = Rc::new(LockedContentResolver::new(Rc::clone(&dep), Rc::clone(&lock), sources));
        }
        let optional: ResolverRef = Rc::new(OptionalResolver::new(Rc::clone(&dep), sources));
        if from_version_lock {
            Rc::new(LockVerifyResolver::new(Rc::clone(&dep), Rc::clone(&lock), optional))
        } else {
            optional
        }
    };

    if let Some(symlinks) = &options.symlinks_path {
        node = Rc::new(SymlinkResolver::new(Rc::clone(&dep), symlinks, node));
    }
    match mode {
        ResolveMode::LockVersions => {
            node = Rc::new(StoreVersionLockResolver::new(Rc::clone(&dep), Rc::clone(&lock), node));
        }
        ResolveMode::LockPaths => {
            node = Rc::new(StorePathLockResolver::new(
                Rc::clone(&dep),
                Rc::clone(&lock),
                &options.project_dir,
                node,
            ));
        }
        _ => {}
    }
    node = Rc::new(ActiveRecordResolver::new(Rc::clone(&dep), &options.records_path, node));

    Ok(Rc::new(ContextResolver::new(dep, mode, node)))
}

/// Build the chain of `dep` with the dependency bound as a temporary.
///
/// # Errors
///
/// Registry errors, or errors raised while assembling the chain.
pub fn dependency_chain(registry: &Registry, dep: &Rc<Dependency>) -> Result<ResolverRef> {
    registry.with_temporary(Temporary::new().value(DEPENDENCY, Rc::clone(dep)), |reg| {
        reg.require(DEPENDENCY_CHAIN)
    })
}
