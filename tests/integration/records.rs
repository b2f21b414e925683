use crate::common::{TestProject, WAF_URL, waf_semver, with_fields};
use depfetch::core::DepfetchError;
use depfetch::lockfile::ResolveRecord;
use depfetch::test_utils::{FakeGit, FakeRemote};
use serde_json::json;

fn resolved_project() -> TestProject {
    let project =
        TestProject::new(FakeGit::new().with_remote(WAF_URL, FakeRemote::new("main", "c0").tag("1.1.0", "c1")));
    project.resolve(vec![waf_semver(1)], project.options()).unwrap();
    project
}

fn load_options(project: &TestProject) -> depfetch::config::Options {
    let mut options = project.options();
    options.load = true;
    options
}

#[test]
fn test_record_written_after_resolve() {
    let project = resolved_project();
    let options = project.options();
    let record = ResolveRecord::load(&options.records_path, "waf").unwrap().unwrap();
    assert!(record.path.ends_with("1.1.0"));
    assert!(record.path.exists());
}

#[test]
fn test_load_replays_records() {
    let project = resolved_project();
    let calls_before = project.git.total_calls();

    let resolved = project.resolve(vec![waf_semver(1)], load_options(&project)).unwrap();

    assert!(resolved.get("waf").unwrap().path.ends_with("1.1.0"));
    assert_eq!(project.git.total_calls(), calls_before);
}

#[test]
fn test_missing_record_of_optional_dependency_is_absent() {
    let project = resolved_project();
    let mut options = load_options(&project);
    options.enabled.insert("extra".to_string());
    let extra = json!({
        "name": "extra",
        "resolver": "http",
        "optional": true,
        "sources": ["https://example.com/extra.bin"],
    });

    let resolved = project.resolve(vec![waf_semver(1), extra], options).unwrap();
    assert!(resolved.get("waf").is_some());
    assert!(resolved.get("extra").is_none());
}

#[test]
fn test_missing_record_of_required_dependency_fails() {
    let project = resolved_project();
    let extra = json!({"name": "extra", "resolver": "http", "sources": ["https://example.com/extra.bin"]});

    let err = project.resolve(vec![waf_semver(1), extra], load_options(&project)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DepfetchError>(),
        Some(DepfetchError::RequiredDependency { .. })
    ));
}

#[test]
fn test_changed_declaration_is_stale() {
    let project = resolved_project();
    let changed = with_fields(waf_semver(1), json!({"recurse": false}));

    let err = project.resolve(vec![changed], load_options(&project)).unwrap_err();
    match err.downcast_ref::<DepfetchError>() {
        Some(DepfetchError::StaleRecord {
            name,
            ..
        }) => assert_eq!(name, "waf"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_removed_path_is_stale() {
    let project = resolved_project();
    std::fs::remove_dir_all(project.dir().join("resolved_dependencies")).unwrap();

    let err = project.resolve(vec![waf_semver(1)], load_options(&project)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DepfetchError>(),
        Some(DepfetchError::StaleRecord { .. })
    ));
}
