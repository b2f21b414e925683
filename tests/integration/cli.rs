use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

fn depfetch(project: &Path) -> Command {
    let mut cmd = Command::cargo_bin("depfetch").unwrap();
    cmd.current_dir(project)
        .env("DEPFETCH_CONFIG_PATH", project.join("no-global-config.toml"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("DEPFETCH_PROJECT_DIR");
    cmd
}

/// Project declaring `waf`, with a local folder to point it at.
fn project() -> TempDir {
    let temp = TempDir::new().unwrap();
    let declarations = json!([{
        "name": "waf",
        "resolver": "git",
        "method": "semver",
        "major": 2,
        "sources": ["https://example.com/org/waf.git"],
    }]);
    std::fs::write(temp.path().join("resolve.json"), declarations.to_string()).unwrap();
    std::fs::create_dir_all(temp.path().join("local/waf")).unwrap();
    temp
}

#[test]
fn test_resolve_with_user_path() {
    let temp = project();
    depfetch(temp.path())
        .args(["resolve", "--no-symlinks", "--path", "waf=local/waf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("waf -> "))
        .stdout(predicate::str::contains("local"));
}

#[test]
fn test_resolve_json_output() {
    let temp = project();
    let output = depfetch(temp.path())
        .args(["resolve", "--no-symlinks", "--format", "json", "--path", "waf=local/waf"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let document: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let path = document["waf"]["path"].as_str().unwrap();
    assert!(path.ends_with("waf"));
    assert_eq!(document["waf"]["recurse"], true);
}

#[test]
fn test_symlink_created_by_default() {
    let temp = project();
    depfetch(temp.path()).args(["resolve", "--path", "waf=local/waf"]).assert().success();
    assert!(temp.path().join("resolve_symlinks/waf").exists());
}

#[test]
fn test_missing_declarations_file() {
    let temp = TempDir::new().unwrap();
    depfetch(temp.path())
        .arg("resolve")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"))
        .stderr(predicate::str::contains("resolve.json"));
}

#[test]
fn test_conflicting_lock_flags_rejected() {
    let temp = project();
    depfetch(temp.path())
        .args(["resolve", "--lock-paths", "--lock-versions"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_load_without_records_fails() {
    let temp = project();
    depfetch(temp.path())
        .arg("load")
        .assert()
        .failure()
        .stderr(predicate::str::contains("waf"));
}

#[test]
fn test_load_replays_previous_resolve() {
    let temp = project();
    depfetch(temp.path())
        .args(["resolve", "--no-symlinks", "--path", "waf=local/waf"])
        .assert()
        .success();

    depfetch(temp.path())
        .args(["load", "--no-symlinks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("waf -> "));
}

#[test]
fn test_malformed_path_flag() {
    let temp = project();
    depfetch(temp.path())
        .args(["resolve", "--path", "waf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NAME=VALUE"));
}
