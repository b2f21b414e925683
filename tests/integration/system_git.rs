use crate::common::TestGit;
use depfetch::config::Options;
use depfetch::git::is_git_installed;
use depfetch::lockfile::{VERSION_LOCK_FILE, VersionLock};
use depfetch::manager::{Collaborators, resolve};
use depfetch::manifest::Declarations;
use serde_json::{Value, json};
use std::path::Path;
use tempfile::TempDir;

/// Upstream repository with three tagged releases.
fn upstream(dir: &Path) -> TestGit {
    let repo = TestGit::new(dir);
    repo.init().unwrap();
    for version in ["1.0.0", "1.1.0", "2.0.0"] {
        repo.commit_file("VERSION", version, &format!("Release {version}")).unwrap();
        repo.tag(version).unwrap();
    }
    repo
}

fn run(project: &Path, declaration: Value, options: Options) -> depfetch::manager::ResolvedSet {
    let declarations = Declarations::inline("resolve.json", vec![declaration]);
    let collaborators = Collaborators::system(&options).unwrap();
    resolve(&declarations, options, collaborators).unwrap_or_else(|e| panic!("{project:?}: {e:#}"))
}

#[test]
fn test_semver_resolution_with_git() {
    if !is_git_installed() {
        eprintln!("git not installed, skipping");
        return;
    }
    let temp = TempDir::new().unwrap();
    let remote = temp.path().join("upstream");
    upstream(&remote);
    let project = temp.path().join("project");

    let declaration = json!({
        "name": "lib",
        "resolver": "git",
        "method": "semver",
        "major": 1,
        "sources": [remote.display().to_string()],
    });
    let mut options = Options::new(&project);
    options.lock_versions = true;
    let resolved = run(&project, declaration, options);

    let path = &resolved.get("lib").unwrap().path;
    assert_eq!(std::fs::read_to_string(path.join("VERSION")).unwrap(), "1.1.0");

    let lock = VersionLock::load(&project.join(VERSION_LOCK_FILE)).unwrap();
    assert_eq!(lock.get("lib").unwrap().checkout, "1.1.0");
}

#[test]
fn test_checkout_resolution_with_git() {
    if !is_git_installed() {
        eprintln!("git not installed, skipping");
        return;
    }
    let temp = TempDir::new().unwrap();
    let remote = temp.path().join("upstream");
    upstream(&remote);
    let project = temp.path().join("project");

    let declaration = json!({
        "name": "lib",
        "resolver": "git",
        "method": "checkout",
        "checkout": "1.0.0",
        "sources": [remote.display().to_string()],
    });
    let mut options = Options::new(&project);
    options.symlinks_path = None;
    let first = run(&project, declaration.clone(), options.clone());
    let path = first.get("lib").unwrap().path.clone();
    assert_eq!(std::fs::read_to_string(path.join("VERSION")).unwrap(), "1.0.0");

    // The existing working copy is reused
    let second = run(&project, declaration, options);
    assert_eq!(second.get("lib").unwrap().path, path);
}
