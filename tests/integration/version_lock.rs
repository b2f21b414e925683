use crate::common::{TestProject, WAF_URL, waf_semver, with_fields};
use depfetch::config::ResolveMode;
use depfetch::core::DepfetchError;
use depfetch::lockfile::{VERSION_LOCK_FILE, VersionLock};
use depfetch::test_utils::{FakeGit, FakeHttp, FakeRemote};
use serde_json::json;

fn remote() -> FakeRemote {
    FakeRemote::new("main", "c0").tag("1.0.0", "c1").tag("1.2.0", "c2")
}

fn locked_project() -> TestProject {
    let project = TestProject::new(FakeGit::new().with_remote(WAF_URL, remote()));
    let mut options = project.options();
    options.lock_versions = true;
    project.resolve(vec![waf_semver(1)], options).unwrap();
    project
}

#[test]
fn test_lock_file_contents() {
    let project = locked_project();
    let content = std::fs::read_to_string(project.dir().join(VERSION_LOCK_FILE)).unwrap();
    let document: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(document["waf"]["checkout"], "1.2.0");
    assert_eq!(document["waf"]["resolver_info"], WAF_URL);
    assert!(document["waf"]["sha1"].is_string());
    assert!(content.ends_with('\n'));
}

#[test]
fn test_lock_reload_is_identical() {
    let project = locked_project();
    let file = project.dir().join(VERSION_LOCK_FILE);
    let lock = VersionLock::load(&file).unwrap();
    let copy = project.dir().join("copy.json");
    lock.save(&copy).unwrap();
    assert_eq!(VersionLock::load(&copy).unwrap(), lock);
    assert_eq!(std::fs::read(&copy).unwrap(), std::fs::read(&file).unwrap());
}

#[test]
fn test_resolve_from_lock_without_fetching() {
    let project = locked_project();
    let first_path = project
        .resolve(vec![waf_semver(1)], {
            let mut options = project.options();
            options.lock_versions = true;
            options
        })
        .unwrap()
        .get("waf")
        .unwrap()
        .path
        .clone();

    // A newer tag is published, the lock keeps the old one
    project.git.set_remote(WAF_URL, remote().tag("1.9.0", "c9"));
    let calls_before = project.git.total_calls();

    let options = project.options();
    assert_eq!(options.mode(), ResolveMode::FromVersionLock);
    let resolved = project.resolve(vec![waf_semver(1)], options).unwrap();

    assert_eq!(resolved.get("waf").unwrap().path, first_path);
    assert_eq!(project.git.total_calls(), calls_before);
}

#[test]
fn test_branch_checkout_replays_without_fetching() {
    let project = TestProject::new(
        FakeGit::new().with_remote(WAF_URL, FakeRemote::new("main", "c0").branch("dev", "d1")),
    );
    let declaration = json!({
        "name": "waf",
        "resolver": "git",
        "method": "checkout",
        "checkout": "dev",
        "sources": [WAF_URL],
    });

    let mut options = project.options();
    options.lock_versions = true;
    let locked_path = project.resolve(vec![declaration.clone()], options).unwrap().get("waf").unwrap().path.clone();
    assert!(locked_path.ends_with("d1"));
    let lock = VersionLock::load(&project.dir().join(VERSION_LOCK_FILE)).unwrap();
    assert_eq!(lock.get("waf").unwrap().checkout, "d1");

    // The branch moves on, the lock keeps the commit it saw
    project.git.set_remote(WAF_URL, FakeRemote::new("main", "c0").branch("dev", "d2"));
    let calls_before = project.git.total_calls();

    let options = project.options();
    assert_eq!(options.mode(), ResolveMode::FromVersionLock);
    let resolved = project.resolve(vec![declaration], options).unwrap();

    let path = &resolved.get("waf").unwrap().path;
    assert_eq!(path, &locked_path);
    assert_eq!(std::fs::read_to_string(path.join("REVISION")).unwrap(), "d1");
    assert_eq!(project.git.total_calls(), calls_before);
}

#[test]
fn test_changed_declaration_is_a_lock_mismatch() {
    let project = locked_project();
    let changed = with_fields(waf_semver(1), json!({"recurse": false}));

    let err = project.resolve(vec![changed], project.options()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DepfetchError>(),
        Some(DepfetchError::LockMismatch { .. })
    ));
}

#[test]
fn test_optional_toggle_keeps_lock_valid() {
    let project = locked_project();
    let mut options = project.options();
    options.enabled.insert("waf".to_string());
    let toggled = with_fields(waf_semver(1), json!({"optional": true}));
    assert!(project.resolve(vec![toggled], options).unwrap().get("waf").is_some());
}

#[test]
fn test_missing_entry_for_required_dependency() {
    let project = locked_project();
    let extra = json!({
        "name": "lib",
        "resolver": "git",
        "method": "checkout",
        "checkout": "main",
        "sources": ["https://example.com/org/lib.git"],
    });
    let err = project.resolve(vec![waf_semver(1), extra], project.options()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DepfetchError>(),
        Some(DepfetchError::LockMismatch { .. })
    ));
}

#[test]
fn test_user_checkout_wins_over_lock() {
    let project = locked_project();
    project.git.set_remote(WAF_URL, remote().branch("develop", "d1"));
    let mut options = project.options();
    options.user_checkouts.insert("waf".to_string(), "develop".to_string());

    let resolved = project.resolve(vec![waf_semver(1)], options).unwrap();
    assert!(resolved.get("waf").unwrap().path.ends_with("develop"));
}

#[test]
fn test_http_content_drift_detected() {
    const URL: &str = "https://example.com/files/gen.bin";
    let project = TestProject::new(FakeGit::new()).with_http(FakeHttp::new().with_file(URL, b"v1".to_vec()));
    let declaration = json!({"name": "gen", "resolver": "http", "sources": [URL]});

    let mut options = project.options();
    options.lock_versions = true;
    let resolved = project.resolve(vec![declaration.clone()], options).unwrap();
    let downloaded = resolved.get("gen").unwrap().path.clone();

    // Unchanged content resolves from the lock
    assert!(project.resolve(vec![declaration.clone()], project.options()).is_ok());

    std::fs::write(&downloaded, b"tampered").unwrap();
    let err = project.resolve(vec![declaration], project.options()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DepfetchError>(),
        Some(DepfetchError::LockMismatch { .. })
    ));
}
