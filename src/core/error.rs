//! Error handling for depfetch
//!
//! The error system follows two rules:
//! 1. **Strongly-typed errors** so resolver nodes can tell a recoverable per-source failure
//!    from a fatal inconsistency.
//! 2. **User-friendly messages** with actionable suggestions for CLI users.
//!
//! # Taxonomy
//!
//! - **Declaration errors** ([`DepfetchError::Declaration`]): malformed, duplicate or conflicting
//!   declarations. Always fatal.
//! - **Resolution errors** ([`DepfetchError::Resolution`] and the collaborator failures such as
//!   [`DepfetchError::GitCommandError`]): one resolver step failed. The isolate node records them on
//!   the dependency and moves on to the next source.
//! - **Required dependency errors** ([`DepfetchError::RequiredDependency`]): a non-optional
//!   dependency ended without a path. Fatal, carries every accumulated per-source message.
//! - **Lock errors** ([`DepfetchError::LockMismatch`], [`DepfetchError::LockIncomplete`]): the
//!   lock file disagrees with the declarations. Fatal.
//!
//! Functions in this crate return [`anyhow::Result`]; typed errors are recovered through
//! `downcast_ref` on the error chain, see [`is_fatal_error`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use depfetch::core::{DepfetchError, ErrorContext, user_friendly_error};
//!
//! let error = DepfetchError::LockMismatch {
//!     name: "waf".to_string(),
//!     message: "fingerprint changed".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for depfetch operations
#[derive(Error, Debug)]
pub enum DepfetchError {
    /// A declaration is malformed, reserved keys are used, or two declarations of the same
    /// name disagree.
    #[error("Invalid dependency declaration: {message}")]
    Declaration {
        /// Description of the problem, including declaring locations where known
        message: String,
    },

    /// One resolver step failed for one source
    #[error("Failed to resolve '{name}': {message}")]
    Resolution {
        /// Dependency name
        name: String,
        /// What went wrong
        message: String,
    },

    /// A dependency that must resolve ended up without a path
    #[error("{}", format_required(.name, .reason, .errors))]
    RequiredDependency {
        /// Dependency name
        name: String,
        /// Why the dependency was required
        reason: String,
        /// Per-source error messages accumulated while resolving
        errors: Vec<String>,
    },

    /// The current declaration does not match what the lock file recorded
    #[error("Lock mismatch for '{name}': {message}")]
    LockMismatch {
        /// Dependency name
        name: String,
        /// Details about the mismatch
        message: String,
    },

    /// A lock entry could not be produced for a resolved dependency
    #[error("Cannot lock '{name}': {reason}")]
    LockIncomplete {
        /// Dependency name
        name: String,
        /// Why the entry could not be written
        reason: String,
    },

    /// A stored resolve record belongs to a different declaration
    #[error("Stale resolve record for '{name}': {reason}")]
    StaleRecord {
        /// Dependency name
        name: String,
        /// Details about the mismatch
        reason: String,
    },

    /// Invalid combination of options
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
    },

    /// Git operation failed during execution
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git operation that failed (e.g., "pull", "checkout")
        operation: String,
        /// The error output from the git command
        stderr: String,
    },

    /// Git executable not found in PATH
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// Git repository clone failed
    #[error("Failed to clone repository: {url}")]
    GitCloneFailed {
        /// The repository URL that failed to clone
        url: String,
        /// The reason for the clone failure
        reason: String,
    },

    /// Git checkout failed
    #[error("Failed to checkout reference '{reference}' in repository")]
    GitCheckoutFailed {
        /// The git reference (branch, tag, or commit) that failed to checkout
        reference: String,
        /// The reason for the checkout failure
        reason: String,
    },

    /// A non-git command (post-resolve step) failed
    #[error("Command failed: {command}")]
    CommandFailed {
        /// The command line that was run
        command: String,
        /// Captured output for diagnostics
        output: String,
    },

    /// Network error
    #[error("Network error: {operation}")]
    NetworkError {
        /// The network operation that failed
        operation: String,
        /// Reason for the network failure
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

fn format_required(name: &str, reason: &str, errors: &[String]) -> String {
    let mut message = format!("Dependency '{name}' could not be resolved: {reason}");
    for error in errors {
        message.push_str("\n  - ");
        message.push_str(error);
    }
    message
}

impl DepfetchError {
    /// Whether this error must abort the whole resolution pass.
    ///
    /// Fatal errors pass through the isolate node untouched; all other errors are treated as a
    /// failure of the current source only.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Declaration { .. }
                | Self::RequiredDependency { .. }
                | Self::LockMismatch { .. }
                | Self::LockIncomplete { .. }
                | Self::StaleRecord { .. }
                | Self::Config { .. }
        )
    }
}

/// Returns true when any error in the chain is a fatal [`DepfetchError`] or a registry error.
#[must_use]
pub fn is_fatal_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause.downcast_ref::<DepfetchError>().is_some_and(DepfetchError::is_fatal)
            || cause.downcast_ref::<crate::registry::RegistryError>().is_some()
    })
}

impl Clone for DepfetchError {
    fn clone(&self) -> Self {
        match self {
            Self::Declaration {
                message,
            } => Self::Declaration {
                message: message.clone(),
            },
            Self::Resolution {
                name,
                message,
            } => Self::Resolution {
                name: name.clone(),
                message: message.clone(),
            },
            Self::RequiredDependency {
                name,
                reason,
                errors,
            } => Self::RequiredDependency {
                name: name.clone(),
                reason: reason.clone(),
                errors: errors.clone(),
            },
            Self::LockMismatch {
                name,
                message,
            } => Self::LockMismatch {
                name: name.clone(),
                message: message.clone(),
            },
            Self::LockIncomplete {
                name,
                reason,
            } => Self::LockIncomplete {
                name: name.clone(),
                reason: reason.clone(),
            },
            Self::StaleRecord {
                name,
                reason,
            } => Self::StaleRecord {
                name: name.clone(),
                reason: reason.clone(),
            },
            Self::Config {
                message,
            } => Self::Config {
                message: message.clone(),
            },
            Self::GitCommandError {
                operation,
                stderr,
            } => Self::GitCommandError {
                operation: operation.clone(),
                stderr: stderr.clone(),
            },
            Self::GitNotFound => Self::GitNotFound,
            Self::GitCloneFailed {
                url,
                reason,
            } => Self::GitCloneFailed {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::GitCheckoutFailed {
                reference,
                reason,
            } => Self::GitCheckoutFailed {
                reference: reference.clone(),
                reason: reason.clone(),
            },
            Self::CommandFailed {
                command,
                output,
            } => Self::CommandFailed {
                command: command.clone(),
                output: output.clone(),
            },
            Self::NetworkError {
                operation,
                reason,
            } => Self::NetworkError {
                operation: operation.clone(),
                reason: reason.clone(),
            },
            // For errors that don't implement Clone, convert to Other
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::JsonError(e) => Self::Other {
                message: format!("JSON error: {e}"),
            },
            Self::TomlError(e) => Self::Other {
                message: format!("TOML parsing error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// When displayed, errors show the main message in red, optional details in yellow and an
/// optional suggestion in green.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: DepfetchError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details
    #[must_use]
    pub const fn new(error: DepfetchError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with a suggestion matching its kind.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(depfetch_error) = error.chain().find_map(|e| e.downcast_ref::<DepfetchError>()) {
        let ctx = create_error_context(depfetch_error.clone());
        // Keep outer context messages, they usually name the file or dependency involved
        if ctx.details.is_none() && error.chain().count() > 1 {
            return ctx.with_details(error.to_string());
        }
        return ctx;
    }

    if let Some(registry_error) = error.downcast_ref::<crate::registry::RegistryError>() {
        return ErrorContext::new(DepfetchError::Other {
            message: registry_error.to_string(),
        })
        .with_details("The resolver chain could not be assembled; this is a bug in the host integration");
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        if io_error.kind() == std::io::ErrorKind::PermissionDenied {
            return ErrorContext::new(DepfetchError::Other {
                message: error.to_string(),
            })
            .with_suggestion("Check ownership of the resolve and symlink directories");
        }
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(DepfetchError::Other {
        message,
    })
}

fn create_error_context(error: DepfetchError) -> ErrorContext {
    match &error {
        DepfetchError::GitNotFound => ErrorContext::new(error)
            .with_suggestion("Install git from https://git-scm.com/ or your system's package manager")
            .with_details("depfetch uses the system git command for all repository operations"),
        DepfetchError::GitCloneFailed {
            url,
            reason,
        } => {
            let suggestion = format!(
                "Check that the repository exists and is reachable: {url}. \
                 Try a different --git-protocol if authentication fails"
            );
            let details = reason.clone();
            ErrorContext::new(error).with_suggestion(suggestion).with_details(details)
        }
        DepfetchError::GitCommandError {
            stderr,
            ..
        } => {
            let details = stderr.clone();
            ErrorContext::new(error).with_details(details)
        }
        DepfetchError::CommandFailed {
            output,
            ..
        } => {
            let details = output.clone();
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion("The working copy was removed; fix the command and resolve again")
        }
        DepfetchError::LockMismatch {
            ..
        } => ErrorContext::new(error).with_suggestion(
            "The declaration changed since the lock file was written. \
             Regenerate it with --lock-versions or --lock-paths",
        ),
        DepfetchError::StaleRecord {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Run 'depfetch resolve' again before loading resolved paths"),
        DepfetchError::RequiredDependency {
            name,
            ..
        } => {
            let suggestion = format!(
                "Check the sources declared for '{name}', or pass --path {name}=<dir> to use a local copy"
            );
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        DepfetchError::Config {
            ..
        } => ErrorContext::new(error).with_suggestion("Run 'depfetch resolve --help' for valid option combinations"),
        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_fatal_classification() {
        assert!(
            DepfetchError::Declaration {
                message: "x".into()
            }
            .is_fatal()
        );
        assert!(
            DepfetchError::LockMismatch {
                name: "a".into(),
                message: "b".into()
            }
            .is_fatal()
        );
        assert!(
            !DepfetchError::Resolution {
                name: "a".into(),
                message: "b".into()
            }
            .is_fatal()
        );
        assert!(
            !DepfetchError::GitCloneFailed {
                url: "u".into(),
                reason: "r".into()
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_is_fatal_error_looks_through_context() {
        let error = anyhow::Error::from(DepfetchError::LockMismatch {
            name: "a".into(),
            message: "b".into(),
        });
        let wrapped = Err::<(), _>(error).context("while resolving a").unwrap_err();
        assert!(is_fatal_error(&wrapped));

        let plain = anyhow::anyhow!("network down");
        assert!(!is_fatal_error(&plain));
    }

    #[test]
    fn test_required_dependency_lists_errors() {
        let error = DepfetchError::RequiredDependency {
            name: "waf".into(),
            reason: "no source succeeded".into(),
            errors: vec!["first failed".into(), "second failed".into()],
        };
        let message = error.to_string();
        assert!(message.contains("'waf'"));
        assert!(message.contains("  - first failed"));
        assert!(message.contains("  - second failed"));
    }

    #[test]
    fn test_user_friendly_lock_mismatch() {
        let ctx = user_friendly_error(anyhow::Error::from(DepfetchError::LockMismatch {
            name: "a".into(),
            message: "b".into(),
        }));
        assert!(ctx.suggestion.unwrap().contains("--lock-versions"));
    }

    #[test]
    fn test_error_context_display() {
        let ctx = ErrorContext::new(DepfetchError::GitNotFound)
            .with_details("details here")
            .with_suggestion("install git");
        let text = ctx.to_string();
        assert!(text.contains("Git is not installed"));
        assert!(text.contains("Details: details here"));
        assert!(text.contains("Suggestion: install git"));
    }
}
