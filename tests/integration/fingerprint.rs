use depfetch::core::DepfetchError;
use depfetch::dependency::{AuditAction, Dependency};
use serde_json::{Value, json};

fn declaration() -> Value {
    json!({
        "name": "waf",
        "resolver": "git",
        "method": "checkout",
        "checkout": "v1.0.0",
        "sources": ["github.com/org/waf.git"],
    })
}

fn fingerprint(value: &Value) -> String {
    Dependency::new(value).unwrap().fingerprint().to_string()
}

#[test]
fn test_key_order_does_not_matter() {
    let reordered: Value = serde_json::from_str(
        r#"{"sources": ["github.com/org/waf.git"], "checkout": "v1.0.0", "method": "checkout",
            "resolver": "git", "name": "waf"}"#,
    )
    .unwrap();
    assert_eq!(fingerprint(&declaration()), fingerprint(&reordered));
}

#[test]
fn test_optional_and_internal_are_not_hashed() {
    let base = fingerprint(&declaration());
    for (field, value) in [("optional", true), ("internal", true)] {
        let mut toggled = declaration();
        toggled[field] = json!(value);
        assert_eq!(fingerprint(&toggled), base, "toggling {field} changed the fingerprint");
    }
}

#[test]
fn test_other_fields_are_hashed() {
    let base = fingerprint(&declaration());
    let changes = [
        ("recurse", json!(false)),
        ("checkout", json!("v1.0.1")),
        ("sources", json!(["gitlab.com/org/waf.git"])),
        ("pull_submodules", json!(true)),
    ];
    for (field, value) in changes {
        let mut changed = declaration();
        changed[field] = value;
        assert_ne!(fingerprint(&changed), base, "changing {field} kept the fingerprint");
    }
}

#[test]
fn test_rewrite_is_audited() {
    let dep = Dependency::new(&declaration()).unwrap();
    let before = dep.fingerprint().to_string();

    assert!(dep.set("checkout", "main").is_err());
    dep.rewrite("checkout", Some(json!("main")), "user checkout override").unwrap();

    let log = dep.audit_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].action, AuditAction::Modify);
    assert_eq!(log[0].old, Some(json!("v1.0.0")));
    assert_eq!(log[0].new, Some(json!("main")));
    assert_eq!(dep.checkout().as_deref(), Some("main"));
    assert_eq!(dep.fingerprint(), before);

    let err = dep.rewrite("extract", None, "cleanup").unwrap_err();
    assert!(matches!(err.downcast_ref::<DepfetchError>(), Some(DepfetchError::Declaration { .. })));
    assert_eq!(dep.audit_log().len(), 1);
}

#[test]
fn test_reserved_key_rejected() {
    let mut declaration = declaration();
    declaration["sha1"] = json!("abc");
    assert!(Dependency::new(&declaration).is_err());
}

#[test]
fn test_extension_attributes() {
    let dep = Dependency::new(&declaration()).unwrap();
    assert_eq!(dep.get("git_commit"), None);
    dep.set("git_commit", "c1").unwrap();
    assert_eq!(dep.get_str("git_commit").as_deref(), Some("c1"));
}
