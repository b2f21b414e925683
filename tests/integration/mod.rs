//! Integration test suite for depfetch
//!
//! End-to-end resolution passes against fake collaborators, plus command-line tests of the
//! `depfetch` binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: the `depfetch` binary (`resolve`, `load`, error reporting)
//! - **diamond**: a dependency required by several others is fetched once
//! - **fallback**: source fallback, error accumulation and optionality
//! - **fingerprint**: declaration identity and the rewrite audit log
//! - **path_lock**: writing and consuming `lock_path_resolve.json`
//! - **project_dir**: a relative project directory still produces usable paths
//! - **records**: `load` replay of resolve records
//! - **registry**: dependency-injection container behavior
//! - **system_git**: resolution through the real `git` binary (skipped without git)
//! - **version_lock**: writing and consuming `lock_version_resolve.json`

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod cli;
mod diamond;
mod fallback;
mod fingerprint;
mod path_lock;
mod project_dir;
mod records;
mod registry;
mod system_git;
mod version_lock;
