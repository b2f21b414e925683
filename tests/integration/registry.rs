use crate::common::{TestProject, waf_semver};
use depfetch::config::ResolveMode;
use depfetch::core::is_fatal_error;
use depfetch::dependency::Dependency;
use depfetch::registry::providers::{DEPENDENCY, DEPENDENCY_CHAIN, GIT_URL, dependency_chain, register_defaults};
use depfetch::registry::{CacheMode, Registry, RegistryError};
use depfetch::test_utils::{FakeGit, FakeRemote};
use std::rc::Rc;

const MIRROR: &str = "https://mirror.example.com/waf.git";

fn registry(project: &TestProject) -> Registry {
    let registry = Registry::new();
    register_defaults(&registry, Rc::new(project.options()), &project.collaborators(), ResolveMode::Resolve)
        .unwrap();
    registry
}

#[test]
fn test_overridden_provider_is_used_by_the_chain() {
    let project =
        TestProject::new(FakeGit::new().with_remote(MIRROR, FakeRemote::new("main", "m0").tag("1.3.0", "m1")));
    let registry = registry(&project);
    registry.provide_override(GIT_URL, &[], CacheMode::Cache, |_| Ok(MIRROR.to_string()));

    let dep = Rc::new(Dependency::new(&waf_semver(1)).unwrap());
    let path = dependency_chain(&registry, &dep).unwrap().resolve().unwrap().unwrap();

    assert!(path.ends_with("1.3.0"));
    assert_eq!(project.git.calls("clone"), 1);
}

#[test]
fn test_chain_outside_a_dependency_scope() {
    let project = TestProject::new(FakeGit::new());
    let registry = registry(&project);

    let Err(err) = registry.require(DEPENDENCY_CHAIN) else {
        panic!("chain built without a dependency in scope");
    };
    assert_eq!(
        err.downcast_ref::<RegistryError>(),
        Some(&RegistryError::MissingProvider {
            key: "dependency".to_string(),
            requested_by: "dependency_chain".to_string(),
        })
    );
    assert!(is_fatal_error(&err));
}

#[test]
fn test_dependency_unbound_after_failed_chain() {
    let project = TestProject::new(FakeGit::new());
    let registry = registry(&project);
    registry.provide_override(GIT_URL, &[], CacheMode::Cache, |_| anyhow::bail!("no mirror configured"));

    let dep = Rc::new(Dependency::new(&waf_semver(1)).unwrap());
    assert!(dependency_chain(&registry, &dep).is_err());
    assert!(!registry.contains(DEPENDENCY));

    // The scope can be entered again
    assert!(dependency_chain(&registry, &dep).is_err());
}
