use crate::common::{TestProject, WAF_URL, waf_semver, with_fields};
use depfetch::config::ResolveMode;
use depfetch::core::DepfetchError;
use depfetch::lockfile::{PATH_LOCK_FILE, PathLock};
use depfetch::test_utils::{FakeGit, FakeRemote};
use serde_json::json;
use tempfile::TempDir;

fn project() -> TestProject {
    TestProject::new(FakeGit::new().with_remote(WAF_URL, FakeRemote::new("main", "c0").tag("1.2.0", "c2")))
}

fn locked_project() -> TestProject {
    let project = project();
    let mut options = project.options();
    options.lock_paths = true;
    project.resolve(vec![waf_semver(1)], options).unwrap();
    project
}

#[test]
fn test_paths_are_stored_relative() {
    let project = locked_project();
    let lock = PathLock::load(&project.dir().join(PATH_LOCK_FILE)).unwrap();
    let entry = lock.get("waf").unwrap();

    assert!(entry.path.starts_with("resolved_dependencies/waf-"));
    assert!(entry.path.ends_with("/1.2.0"));
    assert!(!entry.path.contains('\\'));
}

#[test]
fn test_resolve_from_path_lock_without_git() {
    let project = locked_project();
    let calls_before = project.git.total_calls();

    let options = project.options();
    assert_eq!(options.mode(), ResolveMode::FromPathLock);
    let resolved = project.resolve(vec![waf_semver(1)], options).unwrap();

    let lock = PathLock::load(&project.dir().join(PATH_LOCK_FILE)).unwrap();
    let expected = project.dir().join(&lock.get("waf").unwrap().path);
    assert_eq!(resolved.get("waf").unwrap().path, expected);
    assert_eq!(project.git.total_calls(), calls_before);
}

#[test]
fn test_user_checkout_wins_over_path_lock() {
    let project = locked_project();
    project.git.set_remote(WAF_URL, FakeRemote::new("main", "c0").tag("1.2.0", "c2").branch("develop", "d1"));
    let mut options = project.options();
    options.user_checkouts.insert("waf".to_string(), "develop".to_string());
    assert_eq!(options.mode(), ResolveMode::FromPathLock);

    let resolved = project.resolve(vec![waf_semver(1)], options).unwrap();
    let path = &resolved.get("waf").unwrap().path;
    assert!(path.ends_with("develop"), "locked path used: {}", path.display());
    assert_eq!(std::fs::read_to_string(path.join("REVISION")).unwrap(), "d1");
}

#[test]
fn test_changed_declaration_is_a_lock_mismatch() {
    let project = locked_project();
    let changed = with_fields(waf_semver(1), json!({"pull_submodules": true}));

    let err = project.resolve(vec![changed], project.options()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DepfetchError>(),
        Some(DepfetchError::LockMismatch { .. })
    ));
}

#[test]
fn test_deleted_locked_path_fails_required_dependency() {
    let project = locked_project();
    std::fs::remove_dir_all(project.dir().join("resolved_dependencies")).unwrap();

    let err = project.resolve(vec![waf_semver(1)], project.options()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DepfetchError>(),
        Some(DepfetchError::RequiredDependency { .. })
    ));
}

#[test]
fn test_path_outside_project_cannot_be_locked() {
    let project = project();
    let elsewhere = TempDir::new().unwrap();
    let mut options = project.options();
    options.lock_paths = true;
    options.resolve_path = elsewhere.path().join("deps");

    let err = project.resolve(vec![waf_semver(1)], options).unwrap_err();
    match err.downcast_ref::<DepfetchError>() {
        Some(DepfetchError::LockIncomplete {
            name,
            reason,
        }) => {
            assert_eq!(name, "waf");
            assert!(reason.contains("outside the project"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!project.dir().join(PATH_LOCK_FILE).exists());
}
