use super::{Resolver, ResolverRef, resolution_error};
use crate::core::DepfetchError;
use crate::dependency::{Dependency, PostResolveStep, attr};
use crate::utils::fs::{copy_dir, move_dir, remove_dir_all};
use crate::utils::{get_shell_command, short_hash};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;
use tracing::{debug, info};

/// Runs the declared `post_resolve` commands in a working copy of the resolved folder.
///
/// The working copy lives next to the folder as `<folder>-post-<hash>`, the hash covering the
/// command list. An existing working copy is trusted. Commands run in a hidden staging copy; on
/// failure the staging copy is deleted and [`DepfetchError::CommandFailed`] is returned, so a
/// half-built tree is never picked up later.
pub struct PostResolveRunResolver {
    dep: Rc<Dependency>,
    steps: Vec<PostResolveStep>,
    inner: ResolverRef,
}

impl PostResolveRunResolver {
    /// Run `steps` on the results of `inner`.
    #[must_use]
    pub fn new(dep: Rc<Dependency>, steps: Vec<PostResolveStep>, inner: ResolverRef) -> Self {
        Self {
            dep,
            steps,
            inner,
        }
    }

    fn commands(&self) -> Vec<&str> {
        self.steps
            .iter()
            .map(|step| match step {
                PostResolveStep::Run {
                    command,
                } => command.as_str(),
            })
            .collect()
    }

    fn run_all(&self, dir: &Path) -> Result<()> {
        let (shell, flag) = get_shell_command();
        for command in self.commands() {
            debug!(dependency = %self.dep, command, "Running post-resolve command");
            let output = Command::new(shell)
                .arg(flag)
                .arg(command)
                .current_dir(dir)
                .output()
                .with_context(|| format!("Failed to start '{command}'"))?;
            if !output.status.success() {
                let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
                captured.push_str(&String::from_utf8_lossy(&output.stderr));
                return Err(DepfetchError::CommandFailed {
                    command: command.to_string(),
                    output: captured.trim().to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

impl Resolver for PostResolveRunResolver {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        let Some(path) = self.inner.resolve()? else {
            return Ok(None);
        };
        if !path.is_dir() {
            return Err(resolution_error(
                &self.dep,
                format!("post_resolve needs a folder, {} is not one", path.display()),
            ));
        }

        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return Err(resolution_error(&self.dep, format!("{} has no parent folder", path.display())));
        };
        let folder = format!("{}-post-{}", name.to_string_lossy(), short_hash(self.commands().join("\n")));
        let target = parent.join(&folder);
        if target.is_dir() {
            debug!(dependency = %self.dep, folder = %target.display(), "Reusing post-resolve copy");
            self.dep.set(attr::RESOLVER_ACTION, "post_resolve_cached")?;
            return Ok(Some(target));
        }

        let staging = parent.join(format!(".{folder}.tmp"));
        remove_dir_all(&staging)?;
        copy_dir(&path, &staging)?;
        info!(dependency = %self.dep, steps = self.steps.len(), "Running post-resolve steps");
        if let Err(error) = self.run_all(&staging) {
            remove_dir_all(&staging)?;
            return Err(error);
        }
        move_dir(&staging, &target)?;

        self.dep.set(attr::RESOLVER_ACTION, "post_resolve")?;
        Ok(Some(target))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::resolver::test_support::http_dep;
    use crate::test_utils::StubResolver;
    use serde_json::json;
    use tempfile::TempDir;

    fn run(command: &str) -> PostResolveStep {
        PostResolveStep::Run {
            command: command.to_string(),
        }
    }

    #[test]
    fn test_commands_run_in_copy() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("2.0.0");
        std::fs::create_dir_all(&source).unwrap();
        let inner = StubResolver::path(&source);
        let node = PostResolveRunResolver::new(
            http_dep("tool", json!({})),
            vec![run("echo built > out.txt")],
            inner.clone(),
        );

        let path = node.resolve().unwrap().unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("2.0.0-post-"));
        assert!(path.join("out.txt").is_file());
        assert!(!source.join("out.txt").exists());

        // Existing copy is trusted
        std::fs::remove_file(path.join("out.txt")).unwrap();
        assert_eq!(node.resolve().unwrap(), Some(path.clone()));
        assert!(!path.join("out.txt").exists());
    }

    #[test]
    fn test_failure_removes_copy() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("main");
        std::fs::create_dir_all(&source).unwrap();
        let node = PostResolveRunResolver::new(
            http_dep("tool", json!({})),
            vec![run("touch partial"), run("echo nope >&2; exit 3")],
            StubResolver::path(&source),
        );

        let err = node.resolve().unwrap_err();
        match err.downcast_ref::<DepfetchError>() {
            Some(DepfetchError::CommandFailed {
                output,
                ..
            }) => assert_eq!(output, "nope"),
            other => panic!("unexpected error: {other:?}"),
        }
        let entries: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_file_result_is_rejected() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("tool.bin");
        std::fs::write(&file, b"x").unwrap();
        let node = PostResolveRunResolver::new(
            http_dep("tool", json!({})),
            vec![run("true")],
            StubResolver::path(&file),
        );
        assert!(node.resolve().is_err());
    }
}
