//! HTTP/archive collaborator.
//!
//! [`Http`] downloads one URL to one file and unpacks archives. [`HttpClient`] implements it
//! with a blocking `reqwest` client; `file://` URLs are copied so tests and mirrors on disk work
//! without a server. Either way `dest` is replaced atomically and never holds a partial file.

pub mod archive;

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::core::DepfetchError;
use crate::utils::fs::{atomic_write, ensure_parent_dir};

/// Operations the resolver needs for http dependencies.
pub trait Http {
    /// Fetch `url` into the file `dest`.
    fn download(&self, url: &str, dest: &Path) -> Result<()>;

    /// Unpack `archive` into the directory `dest`.
    fn extract(&self, archive: &Path, dest: &Path) -> Result<()>;
}

/// [`Http`] backed by `reqwest`.
pub struct HttpClient {
    client: reqwest::blocking::Client,
}

impl HttpClient {
    /// Client with a descriptive user agent and a generous timeout.
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("depfetch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(300))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
        })
    }

    /// Underlying client, shared with the tag registry.
    #[must_use]
    pub fn client(&self) -> &reqwest::blocking::Client {
        &self.client
    }
}

impl Http for HttpClient {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        ensure_parent_dir(dest)?;

        if let Some(path) = url.strip_prefix("file://") {
            debug!(url, dest = %dest.display(), "Copying local file");
            let content = std::fs::read(path).with_context(|| format!("Failed to read {path}"))?;
            return atomic_write(dest, &content);
        }

        debug!(url, dest = %dest.display(), "Downloading");
        let network_error = |reason: String| DepfetchError::NetworkError {
            operation: format!("GET {url}"),
            reason,
        };

        let response = self.client.get(url).send().map_err(|e| network_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(network_error(format!("HTTP {}", response.status())).into());
        }
        let bytes = response.bytes().map_err(|e| network_error(e.to_string()))?;

        atomic_write(dest, &bytes)
    }

    fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        archive::extract_archive(archive, dest)
    }
}

/// File name a URL downloads to: its last path segment without query or fragment.
#[must_use]
pub fn file_name_from_url(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && !name.contains(':'))
        .map(str::to_string)
}
