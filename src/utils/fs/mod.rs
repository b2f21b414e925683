//! File system utilities for cross-platform file operations
//!
//! All writes of state files (lock files, resolve records, side maps) go through
//! [`atomic_write`] so an interrupted run never leaves a half-written JSON document behind.
//!
//! # Examples
//!
//! ```rust,no_run
//! use depfetch::utils::fs::{ensure_dir, read_json_file, write_json_file};
//! use std::collections::BTreeMap;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! ensure_dir(Path::new("build/resolve_records"))?;
//!
//! let mut map = BTreeMap::new();
//! map.insert("v1.0.0".to_string(), "v1.0.0".to_string());
//! write_json_file(Path::new("build/tags.json"), &map, true)?;
//!
//! let loaded: BTreeMap<String, String> = read_json_file(Path::new("build/tags.json"))?;
//! # Ok(())
//! # }
//! ```

pub mod atomic;
pub mod dirs;
pub mod formats;
pub mod links;

pub use atomic::atomic_write;
pub use dirs::{copy_dir, ensure_dir, ensure_parent_dir, move_dir, remove_dir_all};
pub use formats::{read_json_file, read_toml_file, write_json_file};
pub use links::{create_dir_link, is_dir_link, read_dir_link, remove_dir_link};
