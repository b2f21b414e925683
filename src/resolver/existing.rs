//! Side-map fast paths that answer from folders materialized by earlier runs.
//!
//! Two small JSON files in each cache root map refs to folders:
//!
//! - `checkouts.json`: checkout ref, resolved commit id and tag, each pointing at the folder
//!   they produced. A branch name is never recorded since its folder moves with the branch; a
//!   branch pinned to a commit folder is recorded under that commit and its tag only.
//! - `tags.json`: tag pointing at its folder, consulted with the tag registry for semver.
//!
//! Entries whose folder disappeared are dropped (and the file rewritten) the next time the map
//! is read.

use super::{Resolver, ResolverRef};
use crate::dependency::{Dependency, attr};
use crate::git::url::project_name;
use crate::tags::TagRegistry;
use crate::utils::fs::{read_json_file, write_json_file};
use crate::version::select_tag;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, warn};

/// Side map of checkout refs.
pub const CHECKOUTS_FILE: &str = "checkouts.json";

/// Side map of tags.
pub const TAGS_FILE: &str = "tags.json";

/// One side-map entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEntry {
    /// Folder relative to the cache root
    pub folder: String,
    /// Commit checked out in the folder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// Tag of that commit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

struct SideMap {
    file: PathBuf,
    entries: BTreeMap<String, SideEntry>,
}

impl SideMap {
    /// Read `file_name` in `cache_root`, dropping entries whose folder is gone.
    fn load(cache_root: &Path, file_name: &str) -> Result<Self> {
        let file = cache_root.join(file_name);
        let mut entries: BTreeMap<String, SideEntry> = if file.is_file() {
            read_json_file(&file)?
        } else {
            BTreeMap::new()
        };

        let before = entries.len();
        entries.retain(|_, entry| cache_root.join(&entry.folder).is_dir());
        let map = Self {
            file,
            entries,
        };
        if map.entries.len() != before {
            debug!(file = %map.file.display(), removed = before - map.entries.len(), "Dropped stale side-map entries");
            map.save()?;
        }
        Ok(map)
    }

    fn save(&self) -> Result<()> {
        write_json_file(&self.file, &self.entries, true)
    }
}

/// Entry describing the folder `path` produced for `dep`, `None` outside `cache_root`.
fn entry_for(dep: &Dependency, cache_root: &Path, path: &Path) -> Option<SideEntry> {
    let folder = path.strip_prefix(cache_root).ok()?;
    Some(SideEntry {
        folder: folder.to_string_lossy().into_owned(),
        commit: dep.get_str(attr::GIT_COMMIT),
        tag: dep.get_str(attr::GIT_TAG),
    })
}

fn restore(dep: &Dependency, entry: &SideEntry, action: &str) -> Result<()> {
    if let Some(commit) = &entry.commit {
        dep.set(attr::GIT_COMMIT, commit.clone())?;
    }
    if let Some(tag) = &entry.tag {
        dep.set(attr::GIT_TAG, tag.clone())?;
    }
    dep.set(attr::RESOLVER_ACTION, action)
}

/// Skips git entirely when the requested ref was materialized before.
pub struct ExistingCheckoutResolver {
    dep: Rc<Dependency>,
    cache_root: PathBuf,
    checkout: String,
    inner: ResolverRef,
}

impl ExistingCheckoutResolver {
    /// Fast path for `checkout` in `cache_root`, falling back to `inner`.
    pub fn new(
        dep: Rc<Dependency>,
        cache_root: impl Into<PathBuf>,
        checkout: impl Into<String>,
        inner: ResolverRef,
    ) -> Self {
        Self {
            dep,
            cache_root: cache_root.into(),
            checkout: checkout.into(),
            inner,
        }
    }
}

impl Resolver for ExistingCheckoutResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        let checkouts = SideMap::load(&self.cache_root, CHECKOUTS_FILE)?;
        if let Some(entry) = checkouts.entries.get(&self.checkout) {
            debug!(dependency = %self.dep, checkout = %self.checkout, "Using existing checkout");
            restore(&self.dep, entry, "existing_checkout")?;
            return Ok(Some(self.cache_root.join(&entry.folder)));
        }

        let Some(path) = self.inner.resolve()? else {
            return Ok(None);
        };
        let is_branch = self.dep.get_bool(attr::GIT_IS_BRANCH) == Some(true);

        if let Some(entry) = entry_for(&self.dep, &self.cache_root, &path) {
            if is_branch && entry.commit.as_deref() != Some(entry.folder.as_str()) {
                return Ok(Some(path));
            }
            let mut checkouts = SideMap::load(&self.cache_root, CHECKOUTS_FILE)?;
            let reference = (!is_branch).then(|| self.checkout.clone());
            let keys = [reference, entry.commit.clone(), entry.tag.clone()];
            for key in keys.into_iter().flatten() {
                checkouts.entries.insert(key, entry.clone());
            }
            checkouts.save()?;
        }
        Ok(Some(path))
    }
}

/// Skips git when the tag registry confirms the best tag was materialized before.
///
/// The registry lookup is best-effort: a failure is logged and the inner resolver runs.
pub struct ExistingTagResolver {
    dep: Rc<Dependency>,
    tags: Rc<dyn TagRegistry>,
    cache_root: PathBuf,
    source: String,
    major: u64,
    inner: ResolverRef,
}

impl ExistingTagResolver {
    /// Fast path for the newest `major` tag of `source`, falling back to `inner`.
    pub fn new(
        dep: Rc<Dependency>,
        tags: Rc<dyn TagRegistry>,
        cache_root: impl Into<PathBuf>,
        source: impl Into<String>,
        major: u64,
        inner: ResolverRef,
    ) -> Self {
        Self {
            dep,
            tags,
            cache_root: cache_root.into(),
            source: source.into(),
            major,
            inner,
        }
    }

    fn best_known_tag(&self) -> Option<String> {
        let project = project_name(&self.source);
        match self.tags.tags_for(&project) {
            Ok(tags) => select_tag(self.major, &tags),
            Err(error) => {
                warn!(dependency = %self.dep, "Tag registry lookup failed: {error:#}");
                None
            }
        }
    }
}

impl Resolver for ExistingTagResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        if let Some(tag) = self.best_known_tag() {
            let known = SideMap::load(&self.cache_root, TAGS_FILE)?;
            if let Some(entry) = known.entries.get(&tag) {
                debug!(dependency = %self.dep, tag = %tag, "Using existing tag");
                restore(&self.dep, entry, "existing_tag")?;
                self.dep.set(attr::GIT_TAG, tag)?;
                return Ok(Some(self.cache_root.join(&entry.folder)));
            }
        }

        let Some(path) = self.inner.resolve()? else {
            return Ok(None);
        };

        if let (Some(entry), Some(tag)) =
            (entry_for(&self.dep, &self.cache_root, &path), self.dep.get_str(attr::GIT_TAG))
        {
            let mut tags = SideMap::load(&self.cache_root, TAGS_FILE)?;
            tags.entries.insert(tag.clone(), entry.clone());
            tags.save()?;

            let mut checkouts = SideMap::load(&self.cache_root, CHECKOUTS_FILE)?;
            for key in [Some(tag), entry.commit.clone()].into_iter().flatten() {
                checkouts.entries.insert(key, entry.clone());
            }
            checkouts.save()?;
        }
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::test_support::git_dep;
    use crate::tags::{NoTagRegistry, StaticTagRegistry};
    use crate::test_utils::StubResolver;
    use serde_json::json;
    use tempfile::TempDir;

    const SOURCE: &str = "https://example.com/waf.git";

    /// Inner resolver that creates `<root>/<folder>` and records a commit and tag.
    fn materializing(dep: &Rc<Dependency>, root: &Path, folder: &str, tag: Option<&str>) -> Rc<StubResolver> {
        let dep = Rc::clone(dep);
        let path = root.join(folder);
        let tag = tag.map(str::to_string);
        StubResolver::with(move || {
            std::fs::create_dir_all(&path)?;
            dep.set(attr::GIT_COMMIT, "c1")?;
            if let Some(tag) = &tag {
                dep.set(attr::GIT_TAG, tag.clone())?;
            }
            Ok(Some(path.clone()))
        })
    }

    #[test]
    fn test_checkout_recorded_then_reused() {
        let temp = TempDir::new().unwrap();
        let dep = git_dep("waf", json!({"method": "checkout", "checkout": "2.0.0"}));
        let inner = materializing(&dep, temp.path(), "c1", Some("2.0.0"));
        ExistingCheckoutResolver::new(Rc::clone(&dep), temp.path(), "2.0.0", inner.clone()).resolve().unwrap();

        let map: BTreeMap<String, SideEntry> = read_json_file(&temp.path().join(CHECKOUTS_FILE)).unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), ["2.0.0", "c1"]);

        // Lookup by commit id hits without calling inner
        let again = git_dep("waf", json!({"method": "checkout", "checkout": "c1"}));
        let node = ExistingCheckoutResolver::new(Rc::clone(&again), temp.path(), "c1", inner.clone());
        assert_eq!(node.resolve().unwrap(), Some(temp.path().join("c1")));
        assert_eq!(inner.calls(), 1);
        assert_eq!(again.get_str(attr::GIT_TAG).as_deref(), Some("2.0.0"));
        assert_eq!(again.get_str(attr::RESOLVER_ACTION).as_deref(), Some("existing_checkout"));
    }

    #[test]
    fn test_branches_not_recorded() {
        let temp = TempDir::new().unwrap();
        let dep = git_dep("waf", json!({"method": "checkout", "checkout": "dev"}));
        let branch_dep = Rc::clone(&dep);
        let path = temp.path().join("dev");
        let inner = StubResolver::with(move || {
            std::fs::create_dir_all(&path)?;
            branch_dep.set(attr::GIT_IS_BRANCH, true)?;
            Ok(Some(path.clone()))
        });
        ExistingCheckoutResolver::new(dep, temp.path(), "dev", inner).resolve().unwrap();
        assert!(!temp.path().join(CHECKOUTS_FILE).exists());
    }

    #[test]
    fn test_pinned_branch_recorded_by_commit() {
        let temp = TempDir::new().unwrap();
        let dep = git_dep("waf", json!({"method": "checkout", "checkout": "dev"}));
        let branch_dep = Rc::clone(&dep);
        let path = temp.path().join("d1");
        let inner = StubResolver::with(move || {
            std::fs::create_dir_all(&path)?;
            branch_dep.set(attr::GIT_IS_BRANCH, true)?;
            branch_dep.set(attr::GIT_COMMIT, "d1")?;
            Ok(Some(path.clone()))
        });
        ExistingCheckoutResolver::new(dep, temp.path(), "dev", inner.clone()).resolve().unwrap();

        let map: BTreeMap<String, SideEntry> = read_json_file(&temp.path().join(CHECKOUTS_FILE)).unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), ["d1"]);

        let pinned = git_dep("waf", json!({"method": "checkout", "checkout": "d1"}));
        let node = ExistingCheckoutResolver::new(Rc::clone(&pinned), temp.path(), "d1", inner.clone());
        assert_eq!(node.resolve().unwrap(), Some(temp.path().join("d1")));
        assert_eq!(inner.calls(), 1);
        assert_eq!(pinned.get_str(attr::GIT_COMMIT).as_deref(), Some("d1"));
    }

    #[test]
    fn test_stale_entries_self_heal() {
        let temp = TempDir::new().unwrap();
        let dep = git_dep("waf", json!({"method": "checkout", "checkout": "c1"}));
        let inner = materializing(&dep, temp.path(), "c1", None);
        ExistingCheckoutResolver::new(Rc::clone(&dep), temp.path(), "c1", inner.clone()).resolve().unwrap();
        std::fs::remove_dir_all(temp.path().join("c1")).unwrap();

        let node = ExistingCheckoutResolver::new(dep, temp.path(), "c1", inner.clone());
        assert_eq!(node.resolve().unwrap(), Some(temp.path().join("c1")));
        assert_eq!(inner.calls(), 2);
    }

    #[test]
    fn test_tag_registry_fast_path() {
        let temp = TempDir::new().unwrap();
        let tags: Rc<dyn TagRegistry> = Rc::new(StaticTagRegistry::new().with_project("waf", ["2.0.0", "2.1.0"]));

        let dep = git_dep("waf", json!({}));
        let inner = materializing(&dep, temp.path(), "2.1.0", Some("2.1.0"));
        ExistingTagResolver::new(Rc::clone(&dep), Rc::clone(&tags), temp.path(), SOURCE, 2, inner.clone())
            .resolve()
            .unwrap();

        let again = git_dep("waf", json!({}));
        let node = ExistingTagResolver::new(Rc::clone(&again), tags, temp.path(), SOURCE, 2, inner.clone());
        assert_eq!(node.resolve().unwrap(), Some(temp.path().join("2.1.0")));
        assert_eq!(inner.calls(), 1);
        assert_eq!(again.get_str(attr::GIT_COMMIT).as_deref(), Some("c1"));

        let checkouts: BTreeMap<String, SideEntry> = read_json_file(&temp.path().join(CHECKOUTS_FILE)).unwrap();
        assert!(checkouts.contains_key("2.1.0"));
    }

    #[test]
    fn test_without_registry_always_delegates() {
        let temp = TempDir::new().unwrap();
        let dep = git_dep("waf", json!({}));
        let inner = materializing(&dep, temp.path(), "2.1.0", Some("2.1.0"));
        for _ in 0..2 {
            ExistingTagResolver::new(Rc::clone(&dep), Rc::new(NoTagRegistry), temp.path(), SOURCE, 2, inner.clone())
                .resolve()
                .unwrap();
        }
        assert_eq!(inner.calls(), 2);
    }
}
