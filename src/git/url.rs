//! Turning declared sources into clone URLs.
//!
//! Sources are usually declared without a scheme (`github.com/org/repo.git`) so that each user
//! can pick how to talk to the host with the `git_protocol` option.

use std::path::Path;

/// Protocol prefixes accepted by the `git_protocol` option.
pub const SUPPORTED_PROTOCOLS: [&str; 6] =
    ["https://", "http://", "git@", "ssh://git@", "ssh://", "git://"];

/// Whether the source already carries its own transport.
///
/// True for URLs with a scheme (`https://`, `file://`), scp-style `user@host:path` and
/// existing local directories.
#[must_use]
pub fn has_transport(source: &str) -> bool {
    if source.contains("://") {
        return true;
    }
    if let Some(colon) = source.find(':') {
        let before = &source[..colon];
        if before.contains('@') && !before.contains('/') {
            return true;
        }
    }
    Path::new(source).is_dir()
}

/// Build the URL to clone for `source` using `protocol`.
///
/// `git@` produces the scp form `git@host:path`; every other protocol is a plain prefix.
///
/// # Examples
///
/// ```rust
/// use depfetch::git::url::clone_url;
///
/// assert_eq!(clone_url("github.com/org/waf.git", "https://"), "https://github.com/org/waf.git");
/// assert_eq!(clone_url("github.com/org/waf.git", "git@"), "git@github.com:org/waf.git");
/// assert_eq!(clone_url("https://host/waf.git", "git@"), "https://host/waf.git");
/// ```
#[must_use]
pub fn clone_url(source: &str, protocol: &str) -> String {
    if has_transport(source) {
        return source.to_string();
    }

    if protocol == "git@" {
        return match source.split_once('/') {
            Some((host, path)) => format!("git@{host}:{path}"),
            None => format!("git@{source}"),
        };
    }

    format!("{protocol}{source}")
}

/// Project name of a source, the last path segment without `.git`.
///
/// Used as the key when asking the tag registry about known tags.
#[must_use]
pub fn project_name(source: &str) -> String {
    let trimmed = source.trim_end_matches(['/', '\\']);
    let last = trimmed.rsplit(['/', '\\', ':']).next().unwrap_or(trimmed);
    last.trim_end_matches(".git").to_string()
}
