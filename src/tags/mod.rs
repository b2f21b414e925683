//! Tag-registry collaborator.
//!
//! A tag registry knows, per project, which tags are published. The existing-tag fast path asks
//! it whether a tag already materialized on disk is still a valid choice, so a semver
//! dependency can be resolved without touching git at all. Lookups are best-effort: any failure
//! is logged and treated as "nothing known".

use anyhow::{Context, Result};
use std::cell::RefCell;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Source of published tags per project.
pub trait TagRegistry {
    /// Tags published for `project`; empty when unknown.
    fn tags_for(&self, project: &str) -> Result<Vec<String>>;
}

/// Registry that never knows anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTagRegistry;

impl TagRegistry for NoTagRegistry {
    fn tags_for(&self, _project: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Registry backed by a fixed map, for tests and offline mirrors.
#[derive(Debug, Default, Clone)]
pub struct StaticTagRegistry {
    tags: BTreeMap<String, Vec<String>>,
}

impl StaticTagRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the tags of one project.
    #[must_use]
    pub fn with_project<I, S>(mut self, project: &str, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.insert(project.to_string(), tags.into_iter().map(Into::into).collect());
        self
    }
}

impl TagRegistry for StaticTagRegistry {
    fn tags_for(&self, project: &str) -> Result<Vec<String>> {
        Ok(self.tags.get(project).cloned().unwrap_or_default())
    }
}

/// Registry served as one JSON document `{"project": ["tag", ...]}`.
///
/// The document is fetched on first use and kept for the rest of the run. A failed fetch is
/// remembered too, so an unreachable server costs one request per run.
pub struct HttpTagRegistry {
    url: String,
    client: reqwest::blocking::Client,
    document: RefCell<Option<BTreeMap<String, Vec<String>>>>,
}

impl HttpTagRegistry {
    /// Registry reading `url` with `client`.
    #[must_use]
    pub fn new(url: impl Into<String>, client: reqwest::blocking::Client) -> Self {
        Self {
            url: url.into(),
            client,
            document: RefCell::new(None),
        }
    }

    fn fetch(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .with_context(|| format!("Failed to fetch tag registry {}", self.url))?
            .error_for_status()
            .with_context(|| format!("Tag registry {} returned an error", self.url))?;
        response.json().with_context(|| format!("Invalid tag registry document at {}", self.url))
    }
}

impl TagRegistry for HttpTagRegistry {
    fn tags_for(&self, project: &str) -> Result<Vec<String>> {
        if self.document.borrow().is_none() {
            let document = match self.fetch() {
                Ok(document) => {
                    debug!(url = %self.url, projects = document.len(), "Loaded tag registry");
                    document
                }
                Err(e) => {
                    warn!("Tag registry unavailable, skipping known-tag lookups: {e:#}");
                    BTreeMap::new()
                }
            };
            *self.document.borrow_mut() = Some(document);
        }

        Ok(self
            .document
            .borrow()
            .as_ref()
            .and_then(|doc| doc.get(project).cloned())
            .unwrap_or_default())
    }
}
