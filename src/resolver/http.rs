use super::{Resolver, resolution_error};
use crate::dependency::{Dependency, attr};
use crate::http::archive::archive_stem;
use crate::http::{Http, file_name_from_url};
use anyhow::Result;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::info;

/// Downloads one source URL into the cache root, optionally unpacking it.
///
/// The download is kept in `<cache root>/download/<file>` and reused when present; with
/// `extract` the archive is unpacked once into `<cache root>/<stem>`.
pub struct HttpResolver {
    http: Rc<dyn Http>,
    dep: Rc<Dependency>,
    cache_root: PathBuf,
    url: String,
}

impl HttpResolver {
    /// Resolver for `url` caching under `cache_root`.
    pub fn new(
        http: Rc<dyn Http>,
        dep: Rc<Dependency>,
        cache_root: impl Into<PathBuf>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            dep,
            cache_root: cache_root.into(),
            url: url.into(),
        }
    }
}

impl Resolver for HttpResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        let file_name = file_name_from_url(&self.url)
            .ok_or_else(|| resolution_error(&self.dep, format!("cannot derive a file name from {}", self.url)))?;

        let download = self.cache_root.join("download").join(&file_name);
        if !download.is_file() {
            info!(dependency = %self.dep, url = %self.url, "Downloading");
            self.http.download(&self.url, &download)?;
        }

        let path = if self.dep.extract() {
            let target = self.cache_root.join(archive_stem(&file_name));
            if !target.is_dir() {
                self.http.extract(&download, &target)?;
            }
            target
        } else {
            download
        };

        self.dep.set(attr::RESOLVER_INFO, self.url.clone())?;
        self.dep.set(attr::RESOLVER_ACTION, "http")?;
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::test_support::http_dep;
    use crate::test_utils::FakeHttp;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use serde_json::json;
    use tempfile::TempDir;

    const URL: &str = "https://example.com/files/tool.tar.gz";

    fn tarball() -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let content = b"#!/bin/sh\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, "bin/tool", &content[..]).unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_download_only() {
        let temp = TempDir::new().unwrap();
        let http = Rc::new(FakeHttp::new().with_file(URL, b"raw".to_vec()));
        let dep = http_dep("tool", json!({}));
        let node = HttpResolver::new(http.clone(), Rc::clone(&dep), temp.path(), URL);

        let path = node.resolve().unwrap().unwrap();
        assert_eq!(path, temp.path().join("download").join("tool.tar.gz"));
        node.resolve().unwrap();
        assert_eq!(http.download_calls(), 1);
        assert_eq!(dep.get_str(attr::RESOLVER_INFO).as_deref(), Some(URL));
    }

    #[test]
    fn test_download_and_extract() {
        let temp = TempDir::new().unwrap();
        let http = Rc::new(FakeHttp::new().with_file(URL, tarball()));
        let node = HttpResolver::new(http, http_dep("tool", json!({"extract": true})), temp.path(), URL);

        let path = node.resolve().unwrap().unwrap();
        assert_eq!(path, temp.path().join("tool"));
        assert!(path.join("bin").join("tool").is_file());
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let node = HttpResolver::new(Rc::new(FakeHttp::new()), http_dep("tool", json!({})), temp.path(), URL);
        assert!(node.resolve().is_err());
    }
}
