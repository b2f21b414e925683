use crate::common::{TestProject, with_fields};
use depfetch::config::ResolveMode;
use depfetch::core::DepfetchError;
use depfetch::dependency::{Dependency, attr};
use depfetch::registry::Registry;
use depfetch::registry::providers::{dependency_chain, register_defaults};
use depfetch::resolver::ResolverRef;
use depfetch::test_utils::{FakeGit, FakeHttp, FakeRemote};
use serde_json::{Value, json};
use std::rc::Rc;

const PRIMARY: &str = "https://primary.example.com/lib.git";
const MIRROR: &str = "https://mirror.example.com/lib.git";

fn lib(extra: Value) -> Value {
    with_fields(
        json!({
            "name": "lib",
            "resolver": "git",
            "method": "semver",
            "major": 1,
            "sources": [PRIMARY, MIRROR],
        }),
        extra,
    )
}

fn chain(project: &TestProject, declaration: &Value) -> (Rc<Dependency>, ResolverRef) {
    let registry = Registry::new();
    register_defaults(&registry, Rc::new(project.options()), &project.collaborators(), ResolveMode::Resolve)
        .unwrap();
    let dep = Rc::new(Dependency::new(declaration).unwrap());
    let chain = dependency_chain(&registry, &dep).unwrap();
    (dep, chain)
}

fn broken_primary() -> FakeGit {
    let git = FakeGit::new().with_remote(MIRROR, FakeRemote::new("main", "m0").tag("1.4.0", "m1"));
    git.set_unreachable(PRIMARY);
    git
}

#[test]
fn test_second_source_used_after_failure() {
    let project = TestProject::new(broken_primary());
    let (dep, chain) = chain(&project, &lib(json!({})));

    let path = chain.resolve().unwrap().unwrap();
    assert!(path.ends_with("1.4.0"));
    let errors = dep.error_messages();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains(PRIMARY), "unexpected error: {}", errors[0]);
    assert_eq!(dep.get_str(attr::GIT_TAG).as_deref(), Some("1.4.0"));
}

#[test]
fn test_all_sources_failing_optional_is_absent() {
    let git = FakeGit::new();
    git.set_unreachable(PRIMARY);
    git.set_unreachable(MIRROR);
    let project = TestProject::new(git);
    let (dep, chain) = chain(&project, &lib(json!({"optional": true})));

    assert_eq!(chain.resolve().unwrap(), None);
    assert_eq!(dep.error_messages().len(), 2);
}

#[test]
fn test_all_sources_failing_required_is_fatal() {
    let git = FakeGit::new();
    git.set_unreachable(PRIMARY);
    git.set_unreachable(MIRROR);
    let project = TestProject::new(git);
    let (_, chain) = chain(&project, &lib(json!({})));

    let err = chain.resolve().unwrap_err();
    match err.downcast_ref::<DepfetchError>() {
        Some(DepfetchError::RequiredDependency {
            name,
            errors,
            ..
        }) => {
            assert_eq!(name, "lib");
            assert_eq!(errors.len(), 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_no_matching_tag_falls_back() {
    let git = FakeGit::new()
        .with_remote(PRIMARY, FakeRemote::new("main", "p0").tag("2.0.0", "p1"))
        .with_remote(MIRROR, FakeRemote::new("main", "m0").tag("1.0.0", "m1"));
    let project = TestProject::new(git);
    let (dep, chain) = chain(&project, &lib(json!({})));

    assert!(chain.resolve().unwrap().unwrap().ends_with("1.0.0"));
    assert_eq!(dep.error_messages().len(), 1);
}

#[test]
fn test_http_mirror() {
    let http = FakeHttp::new().with_file("https://mirror.example.com/gen.bin", b"gen".to_vec());
    let project = TestProject::new(FakeGit::new()).with_http(http);
    let declaration = json!({
        "name": "gen",
        "resolver": "http",
        "sources": ["https://primary.example.com/gen.bin", "https://mirror.example.com/gen.bin"],
    });
    let (dep, chain) = chain(&project, &declaration);

    let path = chain.resolve().unwrap().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"gen");
    assert_eq!(dep.get_str(attr::RESOLVER_INFO).as_deref(), Some("https://mirror.example.com/gen.bin"));
}
