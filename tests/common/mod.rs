//! Common test utilities for depfetch integration tests

// Not every helper is used by every test module
#![allow(dead_code)]

use anyhow::{Context, Result};
use depfetch::config::Options;
use depfetch::manager::{Collaborators, ResolvedSet, resolve};
use depfetch::manifest::{Declarations, ManifestHost};
use depfetch::test_utils::{FakeGit, FakeHttp, StaticTagRegistry};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;
use tempfile::TempDir;

/// Remote used by most tests.
pub const WAF_URL: &str = "https://example.com/org/waf.git";

/// A temporary project directory with fake collaborators.
pub struct TestProject {
    pub temp: TempDir,
    pub git: Rc<FakeGit>,
    pub http: Rc<FakeHttp>,
    pub tags: Rc<StaticTagRegistry>,
}

impl TestProject {
    pub fn new(git: FakeGit) -> Self {
        depfetch::test_utils::init_test_logging(None);
        Self {
            temp: TempDir::new().expect("temp dir"),
            git: Rc::new(git),
            http: Rc::new(FakeHttp::new()),
            tags: Rc::new(StaticTagRegistry::new()),
        }
    }

    pub fn with_http(mut self, http: FakeHttp) -> Self {
        self.http = Rc::new(http);
        self
    }

    pub fn with_tags(mut self, tags: StaticTagRegistry) -> Self {
        self.tags = Rc::new(tags);
        self
    }

    pub fn dir(&self) -> &Path {
        self.temp.path()
    }

    /// Options without the symlink step.
    pub fn options(&self) -> Options {
        let mut options = Options::new(self.dir());
        options.symlinks_path = None;
        options
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            git: self.git.clone(),
            http: self.http.clone(),
            tags: self.tags.clone(),
            host: Rc::new(ManifestHost::default()),
        }
    }

    pub fn resolve(&self, entries: Vec<Value>, options: Options) -> Result<ResolvedSet> {
        let declarations = Declarations::inline(self.dir().join("resolve.json").display().to_string(), entries);
        resolve(&declarations, options, self.collaborators())
    }
}

/// Semver declaration of `waf` against [`WAF_URL`].
pub fn waf_semver(major: u64) -> Value {
    json!({
        "name": "waf",
        "resolver": "git",
        "method": "semver",
        "major": major,
        "sources": [WAF_URL],
    })
}

/// Merge `extra` into the object `base`.
pub fn with_fields(mut base: Value, extra: Value) -> Value {
    if let (Some(target), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
        target.extend(extra.clone());
    }
    base
}

/// Real git repository for tests that exercise the system git binary.
pub struct TestGit {
    repo_path: PathBuf,
}

impl TestGit {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    pub fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(["-c", "user.email=test@depfetch.example", "-c", "user.name=Test User"])
            .args(["-c", "commit.gpgsign=false", "-c", "tag.gpgsign=false"])
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .with_context(|| format!("Failed to run git {args:?}"))?;
        anyhow::ensure!(
            output.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.repo_path)?;
        self.run(&["init", "-q"])?;
        Ok(())
    }

    /// Write `file`, commit it and return the commit id.
    pub fn commit_file(&self, file: &str, content: &str, message: &str) -> Result<String> {
        std::fs::write(self.repo_path.join(file), content)?;
        self.run(&["add", "."])?;
        self.run(&["commit", "-q", "-m", message])?;
        self.run(&["rev-parse", "HEAD"])
    }

    pub fn tag(&self, name: &str) -> Result<()> {
        self.run(&["tag", name])?;
        Ok(())
    }
}
