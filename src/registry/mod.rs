//! Dependency-injection container that assembles resolver chains.
//!
//! Values and providers are bound to typed [`Key`]s. A provider declares the keys it needs; when
//! a key is required the container resolves those arguments first (recursively), then calls the
//! provider's factory with an [`Args`] view that only exposes the declared keys.
//!
//! Providers choose a [`CacheMode`]:
//!
//! - [`CacheMode::None`]: the factory runs on every request;
//! - [`CacheMode::Cache`]: results are memoized per distinct set of resolved arguments, so a
//!   provider depending on the current dependency runs once per dependency;
//! - [`CacheMode::CacheOnce`]: memoized like `Cache`, and asking again with different
//!   arguments is an error. Used for per-run singletons derived from other bindings.
//!
//! Every binding carries a digest. Plain values get a unique identity, temporary values hash
//! their content, and provider results hash their key together with their arguments' digests.
//! The memo table is keyed by `(key, digest of arguments)`.
//!
//! [`Registry::with_temporary`] binds extra values (the current dependency, the current source
//! URL) for the duration of one closure and removes them on every exit path.
//!
//! # Examples
//!
//! ```rust
//! use depfetch::registry::{CacheMode, Key, Registry, Temporary};
//!
//! # fn example() -> anyhow::Result<()> {
//! const NAME: Key<String> = Key::new("name");
//! const GREETING: Key<String> = Key::new("greeting");
//!
//! let registry = Registry::new();
//! registry.provide(GREETING, &[NAME.name()], CacheMode::Cache, |args| {
//!     Ok(format!("hello {}", args.get(NAME)?))
//! })?;
//!
//! let greeting = registry.with_temporary(Temporary::new().value(NAME, "waf".to_string()), |reg| {
//!     reg.require(GREETING)
//! })?;
//! assert_eq!(greeting, "hello waf");
//! # Ok(())
//! # }
//! ```

pub mod providers;

use anyhow::Result;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::rc::Rc;
use thiserror::Error;
use tracing::trace;

/// Errors raised while assembling bindings. All of them are programming errors in the host
/// integration and abort the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A provider is already bound to this key
    #[error("A provider for '{key}' is already registered")]
    ProviderAlreadyRegistered {
        /// Key that was bound twice
        key: String,
    },

    /// Nothing is bound to a required key
    #[error("No provider or value for '{key}' (required by {requested_by})")]
    MissingProvider {
        /// Key that could not be resolved
        key: String,
        /// Provider (or caller) that asked for it
        requested_by: String,
    },

    /// A factory read a key it did not declare
    #[error("Provider '{provider}' read '{key}' without declaring it")]
    UndeclaredRequirement {
        /// Provider whose factory misbehaved
        provider: String,
        /// Key it tried to read
        key: String,
    },

    /// A cache-once provider was asked for a second distinct argument set
    #[error("Provider '{key}' is cache-once but was requested with different arguments")]
    CacheOnceViolation {
        /// Offending provider
        key: String,
    },

    /// The bound value does not have the key's type
    #[error("Value bound to '{key}' has an unexpected type")]
    TypeMismatch {
        /// Key whose value could not be downcast
        key: String,
    },

    /// A temporary value would shadow an existing binding
    #[error("Temporary value for '{key}' conflicts with an existing binding")]
    TemporaryValueConflict {
        /// Key that is already bound
        key: String,
    },

    /// Providers require each other
    #[error("Provider cycle: {chain}")]
    Cycle {
        /// Keys involved, in request order
        chain: String,
    },
}

/// Typed name of a binding.
pub struct Key<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    /// Key called `name`.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Name used in `requires` lists and error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.name)
    }
}

/// Memoization policy of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Run the factory on every request
    None,
    /// Memoize per distinct resolved arguments
    Cache,
    /// Memoize, and reject a second distinct argument set
    CacheOnce,
}

#[derive(Clone)]
struct Binding {
    value: Rc<dyn Any>,
    digest: u64,
}

type Factory = dyn Fn(&Args<'_>) -> Result<Rc<dyn Any>>;

struct Provider {
    requires: Vec<&'static str>,
    cache: CacheMode,
    factory: Box<Factory>,
}

/// Arguments handed to a provider factory.
pub struct Args<'a> {
    registry: &'a Registry,
    provider: &'static str,
    bound: HashMap<&'static str, Binding>,
}

impl Args<'_> {
    /// Value of a declared requirement.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UndeclaredRequirement`] when `key` is not in the provider's `requires`.
    pub fn get<T: Clone + 'static>(&self, key: Key<T>) -> Result<T> {
        let binding = self.bound.get(key.name).ok_or_else(|| RegistryError::UndeclaredRequirement {
            provider: self.provider.to_string(),
            key: key.name.to_string(),
        })?;
        downcast(key, binding)
    }

    /// The container, for providers that dispatch to other keys at build time.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        self.registry
    }
}

/// Extra bindings for one [`Registry::with_temporary`] call.
#[derive(Default)]
pub struct Temporary {
    values: Vec<(&'static str, Binding)>,
}

impl Temporary {
    /// No bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key` to `value`; the digest is the hash of the value.
    #[must_use]
    pub fn value<T: Hash + 'static>(mut self, key: Key<T>, value: T) -> Self {
        let digest = digest_of(&value);
        self.values.push((
            key.name,
            Binding {
                value: Rc::new(value),
                digest,
            },
        ));
        self
    }
}

/// The container.
#[derive(Default)]
pub struct Registry {
    providers: RefCell<HashMap<&'static str, Rc<Provider>>>,
    values: RefCell<HashMap<&'static str, Binding>>,
    memo: RefCell<HashMap<(&'static str, u64), Binding>>,
    once: RefCell<HashMap<&'static str, u64>>,
    resolving: RefCell<Vec<&'static str>>,
    next_identity: Cell<u64>,
}

impl Registry {
    /// Empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a provider to `key`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::ProviderAlreadyRegistered`] when `key` is already bound.
    pub fn provide<T, F>(
        &self,
        key: Key<T>,
        requires: &[&'static str],
        cache: CacheMode,
        factory: F,
    ) -> Result<()>
    where
        T: 'static,
        F: Fn(&Args<'_>) -> Result<T> + 'static,
    {
        if self.is_bound(key.name) {
            return Err(RegistryError::ProviderAlreadyRegistered {
                key: key.name.to_string(),
            }
            .into());
        }
        self.insert_provider(key, requires, cache, factory);
        Ok(())
    }

    /// Bind a provider to `key`, replacing any existing binding.
    pub fn provide_override<T, F>(
        &self,
        key: Key<T>,
        requires: &[&'static str],
        cache: CacheMode,
        factory: F,
    ) where
        T: 'static,
        F: Fn(&Args<'_>) -> Result<T> + 'static,
    {
        self.values.borrow_mut().remove(key.name);
        self.memo.borrow_mut().retain(|(name, _), _| *name != key.name);
        self.once.borrow_mut().remove(key.name);
        self.insert_provider(key, requires, cache, factory);
    }

    /// Bind a fixed value to `key`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::ProviderAlreadyRegistered`] when `key` is already bound.
    pub fn provide_value<T: 'static>(&self, key: Key<T>, value: T) -> Result<()> {
        if self.is_bound(key.name) {
            return Err(RegistryError::ProviderAlreadyRegistered {
                key: key.name.to_string(),
            }
            .into());
        }
        let identity = self.next_identity.get();
        self.next_identity.set(identity + 1);
        self.values.borrow_mut().insert(
            key.name,
            Binding {
                value: Rc::new(value),
                digest: digest_of(&("value", key.name, identity)),
            },
        );
        Ok(())
    }

    /// Resolve `key` and everything it requires.
    ///
    /// # Errors
    ///
    /// Any [`RegistryError`], or an error returned by a factory.
    pub fn require<T: Clone + 'static>(&self, key: Key<T>) -> Result<T> {
        let binding = self.resolve_binding(key.name, "caller")?;
        downcast(key, &binding)
    }

    /// Whether anything is bound to `key`.
    #[must_use]
    pub fn contains<T>(&self, key: Key<T>) -> bool {
        self.is_bound(key.name)
    }

    /// Run `f` with the temporary bindings in place, removing them afterwards.
    ///
    /// # Errors
    ///
    /// [`RegistryError::TemporaryValueConflict`] when a temporary key is already bound, or the
    /// error returned by `f`.
    pub fn with_temporary<R>(
        &self,
        temporary: Temporary,
        f: impl FnOnce(&Self) -> Result<R>,
    ) -> Result<R> {
        if let Some((name, _)) = temporary.values.iter().find(|(name, _)| self.is_bound(name)) {
            return Err(RegistryError::TemporaryValueConflict {
                key: (*name).to_string(),
            }
            .into());
        }

        let keys: Vec<&'static str> = temporary.values.iter().map(|(name, _)| *name).collect();
        self.values.borrow_mut().extend(temporary.values);
        let _guard = TemporaryGuard {
            registry: self,
            keys,
        };

        f(self)
    }

    fn is_bound(&self, name: &str) -> bool {
        self.values.borrow().contains_key(name) || self.providers.borrow().contains_key(name)
    }

    fn insert_provider<T, F>(&self, key: Key<T>, requires: &[&'static str], cache: CacheMode, factory: F)
    where
        T: 'static,
        F: Fn(&Args<'_>) -> Result<T> + 'static,
    {
        let provider = Provider {
            requires: requires.to_vec(),
            cache,
            factory: Box::new(move |args| Ok(Rc::new(factory(args)?) as Rc<dyn Any>)),
        };
        self.providers.borrow_mut().insert(key.name, Rc::new(provider));
    }

    fn resolve_binding(&self, name: &'static str, requested_by: &str) -> Result<Binding> {
        if let Some(binding) = self.values.borrow().get(name) {
            return Ok(binding.clone());
        }

        let provider = self.providers.borrow().get(name).cloned().ok_or_else(|| {
            RegistryError::MissingProvider {
                key: name.to_string(),
                requested_by: requested_by.to_string(),
            }
        })?;

        if self.resolving.borrow().contains(&name) {
            let mut chain: Vec<&str> = self.resolving.borrow().clone();
            chain.push(name);
            return Err(RegistryError::Cycle {
                chain: chain.join(" -> "),
            }
            .into());
        }

        self.resolving.borrow_mut().push(name);
        let result = self.build(name, &provider);
        self.resolving.borrow_mut().pop();
        result
    }

    fn build(&self, name: &'static str, provider: &Provider) -> Result<Binding> {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        let mut bound = HashMap::with_capacity(provider.requires.len());
        for requirement in &provider.requires {
            let binding = self.resolve_binding(requirement, name)?;
            binding.digest.hash(&mut hasher);
            bound.insert(*requirement, binding);
        }
        let digest = hasher.finish();

        if provider.cache != CacheMode::None {
            if let Some(binding) = self.memo.borrow().get(&(name, digest)) {
                trace!(key = name, "Registry cache hit");
                return Ok(binding.clone());
            }
        }

        if provider.cache == CacheMode::CacheOnce {
            if let Some(previous) = self.once.borrow().get(name) {
                if *previous != digest {
                    return Err(RegistryError::CacheOnceViolation {
                        key: name.to_string(),
                    }
                    .into());
                }
            }
        }

        trace!(key = name, "Building binding");
        let args = Args {
            registry: self,
            provider: name,
            bound,
        };
        let binding = Binding {
            value: (provider.factory)(&args)?,
            digest,
        };

        if provider.cache != CacheMode::None {
            self.memo.borrow_mut().insert((name, digest), binding.clone());
        }
        if provider.cache == CacheMode::CacheOnce {
            self.once.borrow_mut().insert(name, digest);
        }
        Ok(binding)
    }
}

struct TemporaryGuard<'a> {
    registry: &'a Registry,
    keys: Vec<&'static str>,
}

impl Drop for TemporaryGuard<'_> {
    fn drop(&mut self) {
        let mut values = self.registry.values.borrow_mut();
        for key in &self.keys {
            values.remove(key);
        }
    }
}

fn downcast<T: Clone + 'static>(key: Key<T>, binding: &Binding) -> Result<T> {
    binding.value.downcast_ref::<T>().cloned().ok_or_else(|| {
        RegistryError::TypeMismatch {
            key: key.name.to_string(),
        }
        .into()
    })
}

fn digest_of<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
