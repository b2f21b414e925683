//! depfetch - reproducible source dependency resolution
//!
//! depfetch turns a list of declared dependencies into one stable filesystem path per
//! dependency. Each dependency names one or more candidate sources (git repositories or http
//! downloads) and how to pick a version; depfetch fetches or reuses a cached copy, selects the
//! version, and can pin the outcome in a lock file so every machine resolves the same thing.
//!
//! # Architecture Overview
//!
//! - A [`dependency::Dependency`] carries the declaration, its fingerprint and the provenance
//!   recorded while resolving.
//! - Every dependency gets a chain of small [`resolver`] nodes, each adding one concern
//!   (fetching, version selection, error isolation, locking, symlinks, records).
//! - The [`registry`] assembles the chain for the current mode of the run.
//! - The [`manager`] walks the declaration tree depth-first, deduplicates by name and runs
//!   post actions such as writing the lock file.
//!
//! # Core Modules
//!
//! ## Core Functionality
//! - [`core`] - error types and user-facing error reports
//! - [`dependency`] - declarations, fingerprints and provenance attributes
//! - [`resolver`] - the resolver nodes
//! - [`registry`] - dependency-injection container and chain providers
//! - [`manager`] - one resolution pass and the [`manager::resolve`] entry point
//!
//! ## Collaborators
//! - [`git`] - source control through the system `git` binary
//! - [`http`] - downloads and archive extraction
//! - [`tags`] - published tag registry
//!
//! ## Persistence
//! - [`lockfile`] - version and path locks, resolve records, content hashes
//! - [`manifest`] - declaration files and recursion into resolved folders
//!
//! ## Supporting Modules
//! - [`config`] - run options, resolve modes and the global configuration file
//! - [`version`] - semantic-version tag selection
//! - [`utils`] - filesystem and platform helpers
//! - [`cli`] - the `depfetch` command line
//!
//! # Declaration Format (resolve.json)
//!
//! ```json
//! [
//!   {
//!     "name": "waf",
//!     "resolver": "git",
//!     "method": "semver",
//!     "major": 2,
//!     "sources": ["github.com/org/waf.git", "gitlab.com/mirror/waf.git"]
//!   },
//!   {
//!     "name": "gen",
//!     "resolver": "http",
//!     "sources": ["https://example.com/gen-1.4.tar.gz"],
//!     "extract": true,
//!     "optional": true
//!   }
//! ]
//! ```
//!
//! # Command-Line Usage
//!
//! ```bash
//! # Resolve and pin versions
//! depfetch resolve --lock-versions
//!
//! # Later runs reuse lock_version_resolve.json automatically
//! depfetch resolve
//!
//! # Replay the previous results without network access
//! depfetch load
//! ```

// Core functionality modules
pub mod cli;
pub mod config;
pub mod core;
pub mod dependency;
pub mod manager;
pub mod registry;
pub mod resolver;

// Collaborators
pub mod git;
pub mod http;
pub mod tags;

// Persistence
pub mod lockfile;
pub mod manifest;

// Supporting modules
pub mod utils;
pub mod version;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
