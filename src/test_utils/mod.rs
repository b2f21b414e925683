//! Test utilities for depfetch
//!
//! Fake collaborators let resolver chains run against temporary directories without a network
//! or a git executable:
//!
//! - [`FakeGit`] - in-memory remotes with per-operation call counters
//! - [`FakeHttp`] - byte payloads served by URL
//! - [`StaticTagRegistry`] - fixed tag lists per project
//! - [`StubResolver`] - a resolver with a canned outcome, for testing single nodes
//!
//! # Example
//!
//! ```rust,no_run
//! use depfetch::test_utils::{FakeGit, FakeRemote, init_test_logging};
//!
//! init_test_logging(None);
//! let git = FakeGit::new().with_remote("https://example.com/waf.git", FakeRemote::new("main", "c1"));
//! ```

pub mod fake_git;
pub mod fake_http;

pub use crate::tags::StaticTagRegistry;
pub use fake_git::{FakeGit, FakeRemote};
pub use fake_http::FakeHttp;

use crate::core::DepfetchError;
use crate::resolver::Resolver;
use anyhow::Result;
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

type Outcome = Box<dyn Fn() -> Result<Option<PathBuf>>>;

/// Resolver returning a canned outcome and counting calls.
pub struct StubResolver {
    outcome: Outcome,
    calls: Cell<usize>,
}

impl StubResolver {
    /// Outcome computed by `f` on every call.
    pub fn with(f: impl Fn() -> Result<Option<PathBuf>> + 'static) -> Rc<Self> {
        Rc::new(Self {
            outcome: Box::new(f),
            calls: Cell::new(0),
        })
    }

    /// Always resolves to `path`.
    pub fn path(path: impl Into<PathBuf>) -> Rc<Self> {
        let path = path.into();
        Self::with(move || Ok(Some(path.clone())))
    }

    /// Always absent.
    #[must_use]
    pub fn absent() -> Rc<Self> {
        Self::with(|| Ok(None))
    }

    /// Always fails with a non-fatal resolution error.
    pub fn failing(message: &str) -> Rc<Self> {
        let message = message.to_string();
        Self::with(move || {
            Err(DepfetchError::Resolution {
                name: "stub".to_string(),
                message: message.clone(),
            }
            .into())
        })
    }

    /// Number of `resolve` calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Resolver for StubResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        self.calls.set(self.calls.get() + 1);
        (self.outcome)()
    }
}
