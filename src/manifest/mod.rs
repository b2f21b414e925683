//! Declaration files and host recursion.
//!
//! A project declares its dependencies in `resolve.json`, either as a bare list or under a
//! `dependencies` key:
//!
//! ```json
//! {
//!   "dependencies": [
//!     {
//!       "name": "waf",
//!       "resolver": "git",
//!       "method": "semver",
//!       "major": 2,
//!       "sources": ["gitlab.com/ita1024/waf.git", "github.com/waf-project/waf.git"]
//!     }
//!   ]
//! }
//! ```
//!
//! Each declaration is kept as raw JSON; [`crate::dependency::Dependency::new`] validates it.
//!
//! The [`Host`] trait is how the resolution pass descends into a resolved dependency. The
//! default [`ManifestHost`] simply reads the dependency's own `resolve.json`; a build tool that
//! wants to run the dependency's build scripts instead provides its own implementation.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::core::DepfetchError;

/// Default declaration file name.
pub const DECLARATIONS_FILE: &str = "resolve.json";

/// Declarations read from one location.
#[derive(Debug, Clone, PartialEq)]
pub struct Declarations {
    /// Where the declarations came from, used in duplicate-declaration errors
    pub location: String,
    /// Raw declaration objects in file order
    pub entries: Vec<Value>,
}

impl Declarations {
    /// Declarations not backed by a file.
    #[must_use]
    pub fn inline(location: impl Into<String>, entries: Vec<Value>) -> Self {
        Self {
            location: location.into(),
            entries,
        }
    }
}

/// Read a declaration file.
///
/// # Errors
///
/// I/O errors, invalid JSON, or a document that is neither a list nor an object with a
/// `dependencies` list ([`DepfetchError::Declaration`]).
pub fn load_declarations(path: &Path) -> Result<Declarations> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read declaration file: {}", path.display()))?;

    let document: Value = serde_json::from_str(&content)
        .map_err(DepfetchError::from)
        .with_context(|| format!("Invalid JSON in declaration file: {}", path.display()))?;

    let entries = match document {
        Value::Array(entries) => entries,
        Value::Object(mut object) => match object.remove("dependencies") {
            Some(Value::Array(entries)) => entries,
            None => Vec::new(),
            Some(_) => {
                return Err(DepfetchError::Declaration {
                    message: format!("'dependencies' must be a list in {}", path.display()),
                }
                .into());
            }
        },
        _ => {
            return Err(DepfetchError::Declaration {
                message: format!(
                    "{} must contain a list of dependencies or an object with 'dependencies'",
                    path.display()
                ),
            }
            .into());
        }
    };

    Ok(Declarations {
        location: path.display().to_string(),
        entries,
    })
}

/// How the resolution pass descends into a resolved dependency.
pub trait Host {
    /// Declarations found in the resolved folder `path`; empty when it declares nothing.
    fn recurse_into(&self, path: &Path) -> Result<Declarations>;
}

/// [`Host`] reading a declaration file from each resolved folder.
#[derive(Debug, Clone)]
pub struct ManifestHost {
    file_name: PathBuf,
}

impl ManifestHost {
    /// Host reading `file_name` (relative to each resolved folder).
    #[must_use]
    pub fn new(file_name: impl Into<PathBuf>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }
}

impl Default for ManifestHost {
    fn default() -> Self {
        Self::new(DECLARATIONS_FILE)
    }
}

impl Host for ManifestHost {
    fn recurse_into(&self, path: &Path) -> Result<Declarations> {
        let file = path.join(&self.file_name);
        if !file.is_file() {
            return Ok(Declarations::inline(file.display().to_string(), Vec::new()));
        }
        load_declarations(&file)
    }
}
