use crate::common::{TestProject, WAF_URL, waf_semver};
use depfetch::config::Options;
use depfetch::test_utils::{FakeGit, FakeRemote};
use serial_test::serial;
use std::path::PathBuf;

/// Restores the working directory when dropped.
struct CwdGuard(PathBuf);

impl Drop for CwdGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.0);
    }
}

#[test]
#[serial]
fn test_relative_project_dir_yields_usable_links() {
    let project = TestProject::new(
        FakeGit::new().with_remote(WAF_URL, FakeRemote::new("main", "c0").tag("1.2.0", "c1")),
    );
    let _guard = CwdGuard(std::env::current_dir().unwrap());
    std::env::set_current_dir(project.dir()).unwrap();

    let options = Options::new(".");
    assert!(options.symlinks_path.is_some());
    let resolved = project.resolve(vec![waf_semver(1)], options).unwrap();

    let path = &resolved.get("waf").unwrap().path;
    assert!(path.is_absolute(), "relative path returned: {}", path.display());
    assert!(path.exists(), "dangling path returned: {}", path.display());
    assert!(path.ends_with("resolve_symlinks/waf"));
    assert_eq!(std::fs::read_to_string(path.join("REVISION")).unwrap(), "c1");
}
