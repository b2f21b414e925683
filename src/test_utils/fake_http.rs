//! In-memory HTTP collaborator serving registered byte payloads.

use crate::core::DepfetchError;
use crate::http::{Http, archive};
use crate::utils::fs::atomic_write;
use anyhow::Result;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::Path;

/// Fake [`Http`] collaborator. Extraction uses the real archive code.
#[derive(Debug, Default)]
pub struct FakeHttp {
    files: RefCell<BTreeMap<String, Vec<u8>>>,
    downloads: Cell<usize>,
}

impl FakeHttp {
    /// No files.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `content` at `url`.
    #[must_use]
    pub fn with_file(self, url: &str, content: impl Into<Vec<u8>>) -> Self {
        self.set_file(url, content);
        self
    }

    /// Add or replace a served file.
    pub fn set_file(&self, url: &str, content: impl Into<Vec<u8>>) {
        self.files.borrow_mut().insert(url.to_string(), content.into());
    }

    /// Number of download calls, successful or not.
    #[must_use]
    pub fn download_calls(&self) -> usize {
        self.downloads.get()
    }
}

impl Http for FakeHttp {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        self.downloads.set(self.downloads.get() + 1);
        let files = self.files.borrow();
        let content = files.get(url).ok_or_else(|| DepfetchError::NetworkError {
            operation: format!("download {url}"),
            reason: "404 Not Found".to_string(),
        })?;
        atomic_write(dest, content)
    }

    fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        archive::extract_archive(archive, dest)
    }
}
