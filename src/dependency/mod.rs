//! Declared dependencies, their fingerprint and provenance attributes.
//!
//! A [`Dependency`] is built once per declaration per run. It holds two maps:
//!
//! - the **declared** fields (`name`, `sources`, `resolver`, `method`, ...), fixed at
//!   construction and only changed through [`Dependency::rewrite`], which appends to an audit log;
//! - the **extension** attributes (`git_commit`, `is_symlink`, `error_messages`, ...), written
//!   freely by resolver nodes to record what happened while resolving.
//!
//! [`Dependency::get`] looks in the declared map first, so an extension can never shadow a
//! declared field, and [`Dependency::set`] refuses to create one that would.
//!
//! # Fingerprint
//!
//! The fingerprint is a SHA-256 over the canonical JSON of the declared fields with defaults
//! applied, leaving out `optional` and `internal`. Toggling those two never invalidates a lock
//! entry or resolve record; any other change does. It is computed once, so later rewrites (for
//! example pinning a locked checkout) keep the identity of the original declaration.
//!
//! # Examples
//!
//! ```rust
//! use depfetch::dependency::Dependency;
//! use serde_json::json;
//!
//! # fn example() -> anyhow::Result<()> {
//! let dep = Dependency::new(&json!({
//!     "name": "waf",
//!     "resolver": "git",
//!     "method": "semver",
//!     "major": 2,
//!     "sources": ["github.com/waf-project/waf.git"],
//! }))?;
//!
//! assert_eq!(dep.name(), "waf");
//! assert!(dep.recurse());
//! assert_eq!(dep.fingerprint().len(), 64);
//! # Ok(())
//! # }
//! ```

use crate::core::DepfetchError;
use crate::utils::sha256_hex;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Key reserved for the fingerprint in lock files and resolve records.
pub const FINGERPRINT_KEY: &str = "sha1";

/// Declared fields that do not take part in the fingerprint.
const UNHASHED_FIELDS: [&str; 2] = ["optional", "internal"];

/// Extension attribute names written by resolver nodes.
pub mod attr {
    /// Name of the node that produced the path (`git_checkout`, `user_path`, ...)
    pub const RESOLVER_ACTION: &str = "resolver_action";
    /// Whether the returned path is a symlink
    pub const IS_SYMLINK: &str = "is_symlink";
    /// Real path behind the symlink
    pub const REAL_PATH: &str = "real_path";
    /// Commit id of a git checkout
    pub const GIT_COMMIT: &str = "git_commit";
    /// Tag of a git checkout, when the commit is tagged
    pub const GIT_TAG: &str = "git_tag";
    /// Set when the checkout follows a branch
    pub const GIT_IS_BRANCH: &str = "git_is_branch";
    /// Per-source error messages collected by the isolate node
    pub const ERROR_MESSAGES: &str = "error_messages";
    /// Free-form provenance stored in the version lock
    pub const RESOLVER_INFO: &str = "resolver_info";
    /// Chain shape used for this dependency
    pub const RESOLVER_CHAIN: &str = "resolver_chain";
}

/// Which collaborator fetches the dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolverKind {
    /// Source control
    Git,
    /// Plain download, optionally extracted
    Http,
}

/// How a git dependency picks its version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// An explicit branch, tag or commit
    Checkout,
    /// Newest tag of a major version
    Semver,
}

/// One step of the `post_resolve` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PostResolveStep {
    /// Run a shell command inside a working copy of the resolved folder
    Run {
        /// Command line passed to the platform shell
        command: String,
    },
}

/// What a [`Dependency::rewrite`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    /// The field did not exist before
    Create,
    /// The field existed and got a new value
    Modify,
    /// The field was removed
    Delete,
}

/// One entry of the rewrite audit log.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    /// Kind of change
    pub action: AuditAction,
    /// Declared field that changed
    pub field: String,
    /// Value before the change
    pub old: Option<Value>,
    /// Value after the change
    pub new: Option<Value>,
    /// Caller supplied explanation
    pub reason: String,
}

/// A single declared dependency.
///
/// Equality and hashing use the fingerprint, so two instances built from the same declaration
/// are interchangeable as map keys.
#[derive(Debug)]
pub struct Dependency {
    declared: RefCell<BTreeMap<String, Value>>,
    extensions: RefCell<BTreeMap<String, Value>>,
    audit: RefCell<Vec<AuditEntry>>,
    fingerprint: String,
}

impl Dependency {
    /// Build a dependency from one declaration object.
    ///
    /// # Errors
    ///
    /// Returns [`DepfetchError::Declaration`] when the declaration is not an object, uses the
    /// reserved `sha1` key, or has missing or mistyped fields.
    pub fn new(declaration: &Value) -> Result<Self> {
        let object = declaration.as_object().ok_or_else(|| DepfetchError::Declaration {
            message: format!("expected an object, got {declaration}"),
        })?;

        if object.contains_key(FINGERPRINT_KEY) {
            return Err(DepfetchError::Declaration {
                message: format!("'{FINGERPRINT_KEY}' is reserved and cannot be declared"),
            }
            .into());
        }

        let mut declared: BTreeMap<String, Value> =
            object.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        declared.entry("recurse".to_string()).or_insert(Value::Bool(true));
        declared.entry("optional".to_string()).or_insert(Value::Bool(false));
        declared.entry("internal".to_string()).or_insert(Value::Bool(false));

        validate(&declared)?;
        let fingerprint = fingerprint_of(&declared);

        Ok(Self {
            declared: RefCell::new(declared),
            extensions: RefCell::new(BTreeMap::new()),
            audit: RefCell::new(Vec::new()),
            fingerprint,
        })
    }

    /// Hex fingerprint of the declaration.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Read a declared field or extension attribute. Absent keys give `None`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.declared.borrow().get(key) {
            return Some(value.clone());
        }
        self.extensions.borrow().get(key).cloned()
    }

    /// Read a string attribute.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(str::to_string))
    }

    /// Read a boolean attribute.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    /// Whether `key` is one of the declared fields.
    #[must_use]
    pub fn is_declared(&self, key: &str) -> bool {
        self.declared.borrow().contains_key(key)
    }

    /// Set an extension attribute.
    ///
    /// # Errors
    ///
    /// Fails when `key` is a declared field; use [`rewrite`](Self::rewrite) for those.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        if self.is_declared(key) {
            return Err(DepfetchError::Declaration {
                message: format!(
                    "'{key}' is a declared field of '{}' and can only be changed with rewrite",
                    self.name()
                ),
            }
            .into());
        }
        self.extensions.borrow_mut().insert(key.to_string(), value.into());
        Ok(())
    }

    /// Remove an extension attribute, returning its previous value.
    pub fn unset(&self, key: &str) -> Option<Value> {
        self.extensions.borrow_mut().remove(key)
    }

    /// Create, modify (`Some`) or delete (`None`) a declared field and log it.
    ///
    /// The fingerprint is not recomputed.
    ///
    /// # Errors
    ///
    /// Fails when deleting an absent field, touching the reserved key, or when the result
    /// would no longer be a valid declaration.
    pub fn rewrite(&self, field: &str, value: Option<Value>, reason: &str) -> Result<()> {
        if field == FINGERPRINT_KEY {
            return Err(DepfetchError::Declaration {
                message: format!("'{FINGERPRINT_KEY}' is reserved and cannot be rewritten"),
            }
            .into());
        }

        let mut candidate = self.declared.borrow().clone();
        let old = candidate.get(field).cloned();
        let action = match (&old, &value) {
            (None, None) => {
                return Err(DepfetchError::Declaration {
                    message: format!(
                        "cannot delete '{field}' of '{}': the field is not declared",
                        self.name()
                    ),
                }
                .into());
            }
            (None, Some(_)) => AuditAction::Create,
            (Some(_), Some(_)) => AuditAction::Modify,
            (Some(_), None) => AuditAction::Delete,
        };

        match &value {
            Some(v) => {
                candidate.insert(field.to_string(), v.clone());
            }
            None => {
                candidate.remove(field);
            }
        }
        validate(&candidate)?;

        // A rewritten field may now collide with an extension of the same name
        self.extensions.borrow_mut().remove(field);
        *self.declared.borrow_mut() = candidate;
        self.audit.borrow_mut().push(AuditEntry {
            action,
            field: field.to_string(),
            old,
            new: value,
            reason: reason.to_string(),
        });
        Ok(())
    }

    /// Every rewrite applied so far, oldest first.
    #[must_use]
    pub fn audit_log(&self) -> Vec<AuditEntry> {
        self.audit.borrow().clone()
    }

    /// Copy of the declared fields (defaults applied).
    #[must_use]
    pub fn declared(&self) -> BTreeMap<String, Value> {
        self.declared.borrow().clone()
    }

    /// Append a per-source error message.
    pub fn push_error(&self, message: impl Into<String>) {
        let mut extensions = self.extensions.borrow_mut();
        let entry = extensions
            .entry(attr::ERROR_MESSAGES.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = entry {
            items.push(Value::String(message.into()));
        }
    }

    /// Error messages collected by isolate nodes.
    #[must_use]
    pub fn error_messages(&self) -> Vec<String> {
        self.get(attr::ERROR_MESSAGES)
            .and_then(|v| {
                v.as_array().map(|items| {
                    items.iter().filter_map(|i| i.as_str().map(str::to_string)).collect()
                })
            })
            .unwrap_or_default()
    }

    /// Dependency name.
    #[must_use]
    pub fn name(&self) -> String {
        self.get_str("name").unwrap_or_default()
    }

    /// Candidate sources in fallback order.
    #[must_use]
    pub fn sources(&self) -> Vec<String> {
        self.get("sources")
            .and_then(|v| {
                v.as_array().map(|items| {
                    items.iter().filter_map(|i| i.as_str().map(str::to_string)).collect()
                })
            })
            .unwrap_or_default()
    }

    /// Collaborator used to fetch this dependency.
    #[must_use]
    pub fn resolver(&self) -> ResolverKind {
        match self.get_str("resolver").as_deref() {
            Some("http") => ResolverKind::Http,
            _ => ResolverKind::Git,
        }
    }

    /// Version selection method of a git dependency.
    #[must_use]
    pub fn method(&self) -> Option<Method> {
        match self.get_str("method").as_deref() {
            Some("checkout") => Some(Method::Checkout),
            Some("semver") => Some(Method::Semver),
            _ => None,
        }
    }

    /// Ref for `method = "checkout"`.
    #[must_use]
    pub fn checkout(&self) -> Option<String> {
        self.declared.borrow().get("checkout").and_then(|v| v.as_str().map(str::to_string))
    }

    /// Major version for `method = "semver"`.
    #[must_use]
    pub fn major(&self) -> Option<u64> {
        self.declared.borrow().get("major").and_then(Value::as_u64)
    }

    /// Whether the dependency may end up unresolved.
    #[must_use]
    pub fn optional(&self) -> bool {
        self.declared_flag("optional", false)
    }

    /// Whether the host should read the resolved folder's own declarations.
    #[must_use]
    pub fn recurse(&self) -> bool {
        self.declared_flag("recurse", true)
    }

    /// Whether only the top-level project resolves this dependency.
    #[must_use]
    pub fn internal(&self) -> bool {
        self.declared_flag("internal", false)
    }

    /// Whether an http download is an archive to unpack.
    #[must_use]
    pub fn extract(&self) -> bool {
        self.declared_flag("extract", false)
    }

    /// Whether submodules are initialised for every materialized checkout.
    #[must_use]
    pub fn pull_submodules(&self) -> bool {
        self.declared_flag("pull_submodules", false)
    }

    /// Declared post-resolve steps, empty when none.
    #[must_use]
    pub fn post_resolve(&self) -> Vec<PostResolveStep> {
        self.declared
            .borrow()
            .get("post_resolve")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    fn declared_flag(&self, key: &str, default: bool) -> bool {
        self.declared.borrow().get(key).and_then(Value::as_bool).unwrap_or(default)
    }
}

impl PartialEq for Dependency {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl Eq for Dependency {}

impl Hash for Dependency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fingerprint.hash(state);
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// SHA-256 over the canonical JSON of `declared` minus the unhashed fields.
fn fingerprint_of(declared: &BTreeMap<String, Value>) -> String {
    let hashed: Map<String, Value> = declared
        .iter()
        .filter(|(key, _)| !UNHASHED_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), canonical(value)))
        .collect();
    sha256_hex(Value::Object(hashed).to_string())
}

/// Rebuild objects with sorted keys at every level.
fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, canonical(v))).collect();
            Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

fn declaration_error(name: &str, message: impl fmt::Display) -> anyhow::Error {
    DepfetchError::Declaration {
        message: format!("dependency '{name}': {message}"),
    }
    .into()
}

fn validate(declared: &BTreeMap<String, Value>) -> Result<()> {
    let name = match declared.get("name").and_then(Value::as_str) {
        Some(name) if !name.trim().is_empty() => name,
        _ => {
            return Err(DepfetchError::Declaration {
                message: "every dependency needs a non-empty 'name'".to_string(),
            }
            .into());
        }
    };
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(declaration_error(name, "the name is used as a folder name"));
    }

    match declared.get("sources").and_then(Value::as_array) {
        Some(sources) if !sources.is_empty() && sources.iter().all(Value::is_string) => {}
        _ => return Err(declaration_error(name, "'sources' must be a non-empty list of strings")),
    }

    for flag in ["optional", "recurse", "internal", "extract", "pull_submodules"] {
        if declared.get(flag).is_some_and(|v| !v.is_boolean()) {
            return Err(declaration_error(name, format_args!("'{flag}' must be true or false")));
        }
    }

    if let Some(steps) = declared.get("post_resolve") {
        serde_json::from_value::<Vec<PostResolveStep>>(steps.clone()).map_err(|e| {
            declaration_error(name, format_args!("invalid 'post_resolve': {e}"))
        })?;
    }

    match declared.get("resolver").and_then(Value::as_str) {
        Some("git") => match declared.get("method").and_then(Value::as_str) {
            Some("checkout") => {
                if !declared.get("checkout").is_some_and(Value::is_string) {
                    return Err(declaration_error(name, "method 'checkout' needs a 'checkout' ref"));
                }
            }
            Some("semver") => {
                if !declared.get("major").is_some_and(Value::is_u64) {
                    return Err(declaration_error(name, "method 'semver' needs an integer 'major'"));
                }
            }
            Some(other) => {
                return Err(declaration_error(name, format_args!("unknown method '{other}'")));
            }
            None => return Err(declaration_error(name, "git dependencies need a 'method'")),
        },
        Some("http") => {}
        Some(other) => return Err(declaration_error(name, format_args!("unknown resolver '{other}'"))),
        None => return Err(declaration_error(name, "missing 'resolver'")),
    }

    Ok(())
}
