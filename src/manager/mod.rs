//! One complete resolution pass.
//!
//! [`DependencyManager`] walks the declaration tree depth-first. Each declaration becomes a
//! [`Dependency`]; after the skip and dedup checks the registry builds its chain, the chain
//! resolves, and when the dependency asks for it the host is asked for the declarations inside
//! the resolved folder, which are handled before returning to the caller.
//!
//! A dependency is handled at most once per pass by name. A second declaration with the same
//! fingerprint gets the first result without any fetch; a different fingerprint is a
//! [`DepfetchError::Declaration`] naming both declaring locations.
//!
//! # Example
//!
//! ```rust,no_run
//! use depfetch::config::Options;
//! use depfetch::manager::{Collaborators, resolve};
//! use depfetch::manifest::load_declarations;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let options = Options::new(".");
//! let declarations = load_declarations(Path::new("resolve.json"))?;
//! let collaborators = Collaborators::system(&options)?;
//! for (name, dependency) in resolve(&declarations, options, collaborators)?.iter() {
//!     println!("{name} -> {}", dependency.path.display());
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::{Options, ResolveMode};
use crate::core::DepfetchError;
use crate::dependency::{Dependency, ResolverKind};
use crate::git::{Git, GitCli};
use crate::http::{Http, HttpClient};
use crate::lockfile::LockCache;
use crate::manifest::{Declarations, Host, ManifestHost};
use crate::registry::Registry;
use crate::registry::providers::{LOCK_CACHE, dependency_chain, register_defaults};
use crate::resolver::pin_checkout;
use crate::tags::{HttpTagRegistry, NoTagRegistry, TagRegistry};
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;
use strsim::levenshtein;
use tracing::{debug, info, warn};

/// External collaborators used by a pass.
#[derive(Clone)]
pub struct Collaborators {
    /// Source control
    pub git: Rc<dyn Git>,
    /// Downloads and archives
    pub http: Rc<dyn Http>,
    /// Published tags per project
    pub tags: Rc<dyn TagRegistry>,
    /// Recursion into resolved folders
    pub host: Rc<dyn Host>,
}

impl Collaborators {
    /// The real collaborators: system git, reqwest, the configured tag registry and
    /// `resolve.json` recursion.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    pub fn system(options: &Options) -> Result<Self> {
        let http = HttpClient::new()?;
        let tags: Rc<dyn TagRegistry> = match &options.tags_url {
            Some(url) => Rc::new(HttpTagRegistry::new(url.clone(), http.client().clone())),
            None => Rc::new(NoTagRegistry),
        };
        Ok(Self {
            git: Rc::new(GitCli::new()),
            http: Rc::new(http),
            tags,
            host: Rc::new(ManifestHost::default()),
        })
    }
}

/// Outcome for one resolved dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDependency {
    /// Path returned by the chain (the stable link when symlinks are enabled)
    pub path: PathBuf,
    /// Whether the host recursed into it
    pub recurse: bool,
    /// Location of the first declaration
    pub declared_in: String,
}

/// Every dependency resolved by a pass, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolvedSet {
    entries: BTreeMap<String, ResolvedDependency>,
}

impl ResolvedSet {
    /// Outcome for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResolvedDependency> {
        self.entries.get(name)
    }

    /// Outcomes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ResolvedDependency)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

type PostAction = Box<dyn FnOnce() -> Result<()>>;

/// Drives one resolution pass.
pub struct DependencyManager {
    registry: Registry,
    options: Rc<Options>,
    mode: ResolveMode,
    host: Rc<dyn Host>,
    lock: Rc<RefCell<LockCache>>,
    declared: BTreeMap<String, (String, String)>,
    handled: BTreeMap<String, Option<PathBuf>>,
    resolved: ResolvedSet,
    post_actions: Vec<PostAction>,
    depth: usize,
}

impl DependencyManager {
    /// Manager for one pass over `options`.
    ///
    /// Validates the options, detects the mode and loads the lock the mode consumes. Locking
    /// runs register a post action that writes the lock.
    ///
    /// # Errors
    ///
    /// [`DepfetchError::Config`] for invalid option combinations, or a lock file that cannot be
    /// read.
    pub fn new(options: Options, collaborators: Collaborators) -> Result<Self> {
        options.validate()?;
        let mode = options.mode();
        let options = Rc::new(options);
        info!(mode = %mode, project = %options.project_dir.display(), "Starting resolution");

        let registry = Registry::new();
        register_defaults(&registry, Rc::clone(&options), &collaborators, mode)?;
        let lock = registry.require(LOCK_CACHE)?;

        let mut manager = Self {
            registry,
            options,
            mode,
            host: collaborators.host,
            lock,
            declared: BTreeMap::new(),
            handled: BTreeMap::new(),
            resolved: ResolvedSet::default(),
            post_actions: Vec::new(),
            depth: 0,
        };

        if mode.is_locking() {
            let lock = Rc::clone(&manager.lock);
            let project_dir = manager.options.project_dir.clone();
            manager.add_post_action(move || {
                lock.borrow().save_in(&project_dir)?;
                info!(project = %project_dir.display(), "Lock file written");
                Ok(())
            });
        }

        Ok(manager)
    }

    /// Mode of this pass.
    #[must_use]
    pub fn mode(&self) -> ResolveMode {
        self.mode
    }

    /// Handle one declaration made in `declared_in`.
    ///
    /// Returns the resolved path, or `None` when the dependency was skipped or optional and
    /// unresolved.
    ///
    /// # Errors
    ///
    /// Declaration errors, conflicting duplicates, and every fatal error raised by the chain.
    pub fn add(&mut self, declaration: &Value, declared_in: &str) -> Result<Option<PathBuf>> {
        let dep = Rc::new(Dependency::new(declaration)?);
        let name = dep.name();

        if dep.internal() && (self.depth > 0 || self.options.skip_internal) {
            debug!(dependency = %name, "Skipping internal dependency");
            return Ok(None);
        }

        if let Some((fingerprint, first_location)) = self.declared.get(&name) {
            if fingerprint != dep.fingerprint() {
                return Err(DepfetchError::Declaration {
                    message: format!(
                        "'{name}' is declared differently in {first_location} and {declared_in}"
                    ),
                }
                .into());
            }
        } else {
            self.declared.insert(name.clone(), (dep.fingerprint().to_string(), declared_in.to_string()));
        }

        if let Some(previous) = self.handled.get(&name) {
            debug!(dependency = %name, "Already handled");
            return Ok(previous.clone());
        }

        if dep.optional()
            && !self.options.enabled.contains(&name)
            && !self.mode.is_locking()
            && !self.options.user_paths.contains_key(&name)
        {
            debug!(dependency = %name, "Optional dependency not enabled");
            return Ok(None);
        }

        self.handled.insert(name.clone(), None);
        self.seed_locked_checkout(&dep)?;

        let chain = dependency_chain(&self.registry, &dep)?;
        let path = chain.resolve()?;
        self.handled.insert(name.clone(), path.clone());

        let Some(path) = path else {
            return Ok(None);
        };
        let recurse = dep.recurse();
        self.resolved.entries.insert(
            name,
            ResolvedDependency {
                path: path.clone(),
                recurse,
                declared_in: declared_in.to_string(),
            },
        );

        if recurse {
            let nested = self.host.recurse_into(&path)?;
            self.depth += 1;
            let result = self.add_all(&nested);
            self.depth -= 1;
            result?;
        }

        Ok(Some(path))
    }

    /// Handle every declaration of `declarations` in order.
    ///
    /// # Errors
    ///
    /// The first error raised by [`DependencyManager::add`].
    pub fn add_all(&mut self, declarations: &Declarations) -> Result<()> {
        for entry in &declarations.entries {
            self.add(entry, &declarations.location)?;
        }
        Ok(())
    }

    /// Run `action` once the tree has been walked.
    pub fn add_post_action(&mut self, action: impl FnOnce() -> Result<()> + 'static) {
        self.post_actions.push(Box::new(action));
    }

    /// Warn about overrides for names never declared, then run the post actions in order.
    ///
    /// # Errors
    ///
    /// The first error returned by a post action.
    pub fn post_resolve(&mut self) -> Result<()> {
        self.warn_unknown_overrides();
        for action in self.post_actions.drain(..) {
            action()?;
        }
        Ok(())
    }

    /// Outcomes so far.
    #[must_use]
    pub fn resolved(&self) -> &ResolvedSet {
        &self.resolved
    }

    /// Consume the manager, keeping the outcomes.
    #[must_use]
    pub fn into_resolved(self) -> ResolvedSet {
        self.resolved
    }

    /// Pin a git dependency to its version lock entry.
    fn seed_locked_checkout(&self, dep: &Dependency) -> Result<()> {
        if self.mode != ResolveMode::FromVersionLock || dep.resolver() != ResolverKind::Git {
            return Ok(());
        }
        let name = dep.name();
        if self.options.user_checkouts.contains_key(&name) {
            return Ok(());
        }
        let lock = self.lock.borrow();
        match lock.version().and_then(|lock| lock.get(&name)) {
            Some(entry) if entry.sha1 == dep.fingerprint() => {
                debug!(dependency = %name, checkout = %entry.checkout, "Pinning to version lock");
                pin_checkout(dep, &entry.checkout, "pinned by version lock")
            }
            _ => Ok(()),
        }
    }

    fn warn_unknown_overrides(&self) {
        let overrides = self
            .options
            .user_paths
            .keys()
            .map(|name| (name, "path"))
            .chain(self.options.user_checkouts.keys().map(|name| (name, "checkout")));
        for (name, kind) in overrides {
            if self.declared.contains_key(name) {
                continue;
            }
            match closest_name(name, self.declared.keys()) {
                Some(candidate) => warn!(
                    "'{name}_{kind}' does not match any declared dependency, did you mean '{candidate}'?"
                ),
                None => warn!("'{name}_{kind}' does not match any declared dependency"),
            }
        }
    }
}

fn closest_name<'a>(name: &str, candidates: impl Iterator<Item = &'a String>) -> Option<&'a String> {
    candidates
        .map(|candidate| (levenshtein(name, candidate), candidate))
        .filter(|(distance, _)| *distance <= 3)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate)
}

/// Resolve `declarations` and their nested declarations in one pass.
///
/// # Errors
///
/// Any fatal error of the pass.
pub fn resolve(declarations: &Declarations, options: Options, collaborators: Collaborators) -> Result<ResolvedSet> {
    let mut manager = DependencyManager::new(options, collaborators)?;
    manager.add_all(declarations)?;
    manager.post_resolve()?;
    let resolved = manager.into_resolved();
    info!(count = resolved.len(), "Resolution finished");
    Ok(resolved)
}
