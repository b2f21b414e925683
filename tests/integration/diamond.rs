use crate::common::{TestProject, WAF_URL, waf_semver, with_fields};
use depfetch::core::DepfetchError;
use depfetch::test_utils::{FakeGit, FakeRemote};
use serde_json::{Value, json};
use std::path::Path;

fn local(name: &str) -> Value {
    json!({
        "name": name,
        "resolver": "git",
        "method": "checkout",
        "checkout": "main",
        "sources": [format!("https://example.com/org/{name}.git")],
    })
}

fn write_declarations(dir: &Path, entries: &Value) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("resolve.json"), serde_json::to_string_pretty(entries).unwrap()).unwrap();
}

fn project() -> TestProject {
    TestProject::new(
        FakeGit::new().with_remote(WAF_URL, FakeRemote::new("main", "w0").tag("2.1.0", "w1").tag("2.3.0", "w2")),
    )
}

#[test]
fn test_shared_dependency_fetched_once() {
    let project = project();
    let app = project.dir().join("checkouts/app");
    let tool = project.dir().join("checkouts/tool");
    write_declarations(&app, &json!([waf_semver(2)]));
    write_declarations(&tool, &json!({"dependencies": [waf_semver(2)]}));

    let mut options = project.options();
    options.user_paths.insert("app".to_string(), app);
    options.user_paths.insert("tool".to_string(), tool);

    let resolved = project.resolve(vec![local("app"), local("tool")], options).unwrap();

    assert_eq!(resolved.len(), 3);
    assert_eq!(project.git.calls("clone"), 1);
    assert_eq!(project.git.calls("checkout"), 1);
    let waf = resolved.get("waf").unwrap();
    assert!(waf.path.ends_with("2.3.0"));
    assert!(waf.declared_in.contains("app"));
}

#[test]
fn test_conflicting_nested_declaration_fails() {
    let project = project();
    let app = project.dir().join("checkouts/app");
    write_declarations(&app, &json!([waf_semver(1)]));

    let mut options = project.options();
    options.user_paths.insert("app".to_string(), app);

    let err = project.resolve(vec![waf_semver(2), local("app")], options).unwrap_err();
    match err.downcast_ref::<DepfetchError>() {
        Some(DepfetchError::Declaration {
            message,
        }) => {
            assert!(message.contains("'waf'"));
            assert!(message.contains("checkouts"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_nested_internal_dependencies_skipped() {
    let project = project();
    let app = project.dir().join("checkouts/app");
    write_declarations(&app, &json!([with_fields(waf_semver(2), json!({"internal": true}))]));

    let mut options = project.options();
    options.user_paths.insert("app".to_string(), app);

    let resolved = project.resolve(vec![local("app")], options).unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(project.git.total_calls(), 0);
}

#[test]
fn test_recurse_false_stops_descent() {
    let project = project();
    let app = project.dir().join("checkouts/app");
    write_declarations(&app, &json!([waf_semver(2)]));

    let mut options = project.options();
    options.user_paths.insert("app".to_string(), app);

    let resolved = project.resolve(vec![with_fields(local("app"), json!({"recurse": false}))], options).unwrap();
    assert_eq!(resolved.len(), 1);
    assert!(!resolved.get("app").unwrap().recurse);
}
