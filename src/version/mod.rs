//! Semantic-version tag selection for `method = "semver"` dependencies.
//!
//! A semver dependency declares only a major version. The newest tag of that major is chosen:
//!
//! 1. Tags containing a path separator (`backups/3.1.0`) are never considered.
//! 2. Each tag is parsed strictly with [`semver::Version::parse`]; if that fails, a leading
//!    `vMAJOR[.MINOR[.PATCH]]` prefix is accepted with missing parts defaulting to 0. Tags without
//!    a numeric prefix are dropped.
//! 3. Only tags whose major equals the request remain, and the maximum under semver precedence
//!    wins (a pre-release sorts below its release).
//!
//! The original tag string is returned, so `v4.0.1` stays `v4.0.1`.
//!
//! # Examples
//!
//! ```rust
//! use depfetch::version::select_tag;
//!
//! let tags = ["1.0.0", "1.3.5", "2.0.0", "3.0.0-lts.0", "3.0.0", "v4.0.1"];
//! assert_eq!(select_tag(1, tags).as_deref(), Some("1.3.5"));
//! assert_eq!(select_tag(3, tags).as_deref(), Some("3.0.0"));
//! assert_eq!(select_tag(4, tags).as_deref(), Some("v4.0.1"));
//! assert_eq!(select_tag(5, tags), None);
//! ```

use regex::Regex;
use semver::Version;
use std::sync::OnceLock;

/// A tag together with the version it was parsed as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    /// The parsed semantic version
    pub version: Version,
    /// The original Git tag string
    pub tag: String,
    /// Whether this is a prerelease version (alpha, beta, rc, etc.)
    pub prerelease: bool,
}

fn loose_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[vV]?(\d+)(?:\.(\d+))?(?:\.(\d+))?").ok()).as_ref()
}

/// Parse a tag, strictly first and then by its leading numeric prefix.
///
/// Returns `None` for tags in subdirectories and for tags without a version prefix.
#[must_use]
pub fn parse_tag(tag: &str) -> Option<VersionInfo> {
    if tag.contains(['/', '\\']) {
        return None;
    }

    let version = match Version::parse(tag) {
        Ok(version) => version,
        Err(_) => {
            let captures = loose_pattern()?.captures(tag)?;
            let part = |i: usize| -> Option<u64> {
                captures.get(i).map_or(Some(0), |m| m.as_str().parse().ok())
            };
            Version::new(part(1)?, part(2)?, part(3)?)
        }
    };

    Some(VersionInfo {
        prerelease: !version.pre.is_empty(),
        version,
        tag: tag.to_string(),
    })
}

/// Select the newest tag whose major version equals `major`.
///
/// When two tags parse to the same version the one listed last wins.
#[must_use]
pub fn select_tag<I, S>(major: u64, tags: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .filter_map(|tag| parse_tag(tag.as_ref()))
        .filter(|info| info.version.major == major)
        .max_by(|a, b| a.version.cmp(&b.version))
        .map(|info| info.tag)
}
