//! Core types shared by every layer of depfetch
//!
//! ## `error` - Error handling
//!
//! - [`DepfetchError`] - every failure mode of a resolution pass
//! - [`ErrorContext`] - user-facing wrapper with suggestions and details
//! - [`user_friendly_error`] - converts any [`anyhow::Error`] into an [`ErrorContext`]
//! - [`is_fatal_error`] - fatal/non-fatal classification used by the isolate node
//!
//! # Examples
//!
//! ```rust
//! use depfetch::core::{DepfetchError, is_fatal_error};
//!
//! let err = anyhow::Error::from(DepfetchError::Resolution {
//!     name: "waf".to_string(),
//!     message: "no tag for major 3".to_string(),
//! });
//! assert!(!is_fatal_error(&err));
//! ```

pub mod error;

pub use error::{DepfetchError, ErrorContext, is_fatal_error, user_friendly_error};
