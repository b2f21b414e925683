//! Source-control collaborator.
//!
//! The resolver only talks to git through the [`Git`] trait. [`GitCli`] implements it with the
//! system `git` binary, the same way `cargo` does with `git-fetch-with-cli`: existing SSH agents,
//! credential helpers and git configuration keep working. Every operation is scoped to one
//! working directory and is stateless.
//!
//! Tests substitute `test_utils::FakeGit`, which counts calls per operation.

pub mod command_builder;
pub mod url;

use anyhow::Result;
use std::path::Path;

use crate::core::DepfetchError;
use command_builder::GitCommand;

/// Operations the resolver needs from source control.
pub trait Git {
    /// Clone `url` into the (absent) directory `target`.
    fn clone_repo(&self, url: &str, target: &Path) -> Result<()>;

    /// Fast-forward the checked-out branch of `dir` from its remote.
    fn pull(&self, dir: &Path) -> Result<()>;

    /// Check out `reference` (branch, tag or commit) in `dir`.
    fn checkout(&self, dir: &Path, reference: &str) -> Result<()>;

    /// All tags known in `dir`.
    fn tags(&self, dir: &Path) -> Result<Vec<String>>;

    /// Branch names available on the remote of `dir`, without the remote prefix.
    fn branches(&self, dir: &Path) -> Result<Vec<String>>;

    /// Checked-out branch of `dir`.
    fn current_branch(&self, dir: &Path) -> Result<String>;

    /// Commit id of `HEAD` in `dir`.
    fn current_commit(&self, dir: &Path) -> Result<String>;

    /// Commit id that `reference` names in `dir`.
    fn rev_parse(&self, dir: &Path, reference: &str) -> Result<String>;

    /// A tag pointing at `HEAD`, if any.
    fn current_tag(&self, dir: &Path) -> Result<Option<String>>;

    /// Whether `HEAD` of `dir` is detached (a tag or commit checkout).
    fn is_detached_head(&self, dir: &Path) -> Result<bool>;

    /// Initialise and update all submodules of `dir`.
    fn pull_submodules(&self, dir: &Path) -> Result<()>;

    /// URL of the `origin` remote of `dir`.
    fn remote_origin_url(&self, dir: &Path) -> Result<String>;
}

/// [`Git`] backed by the system `git` executable.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitCli;

impl GitCli {
    /// Create the collaborator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Git for GitCli {
    fn clone_repo(&self, url: &str, target: &Path) -> Result<()> {
        GitCommand::clone(url, target).execute_success()
    }

    fn pull(&self, dir: &Path) -> Result<()> {
        GitCommand::pull().current_dir(dir).execute_success()
    }

    fn checkout(&self, dir: &Path, reference: &str) -> Result<()> {
        GitCommand::checkout(reference).current_dir(dir).execute_success()
    }

    fn tags(&self, dir: &Path) -> Result<Vec<String>> {
        let output = GitCommand::list_tags().current_dir(dir).execute_stdout()?;
        Ok(lines(&output))
    }

    fn branches(&self, dir: &Path) -> Result<Vec<String>> {
        let output = GitCommand::list_remote_branches().current_dir(dir).execute_stdout()?;
        Ok(lines(&output)
            .into_iter()
            .filter_map(|line| line.strip_prefix("origin/").map(str::to_string))
            .filter(|branch| branch != "HEAD")
            .collect())
    }

    fn current_branch(&self, dir: &Path) -> Result<String> {
        let branch = GitCommand::current_branch().current_dir(dir).execute_stdout()?;
        if branch.is_empty() {
            return Err(DepfetchError::GitCommandError {
                operation: "branch --show-current".to_string(),
                stderr: format!("{} has a detached HEAD", dir.display()),
            }
            .into());
        }
        Ok(branch)
    }

    fn current_commit(&self, dir: &Path) -> Result<String> {
        GitCommand::current_commit().current_dir(dir).execute_stdout()
    }

    fn rev_parse(&self, dir: &Path, reference: &str) -> Result<String> {
        GitCommand::rev_parse(reference).current_dir(dir).execute_stdout()
    }

    fn current_tag(&self, dir: &Path) -> Result<Option<String>> {
        let output = GitCommand::tags_at_head().current_dir(dir).execute_stdout()?;
        Ok(lines(&output).into_iter().next())
    }

    fn is_detached_head(&self, dir: &Path) -> Result<bool> {
        let branch = GitCommand::current_branch().current_dir(dir).execute_stdout()?;
        Ok(branch.is_empty())
    }

    fn pull_submodules(&self, dir: &Path) -> Result<()> {
        GitCommand::update_submodules().current_dir(dir).execute_success()
    }

    fn remote_origin_url(&self, dir: &Path) -> Result<String> {
        GitCommand::remote_url().current_dir(dir).execute_stdout()
    }
}

fn lines(output: &str) -> Vec<String> {
    output.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect()
}

/// Check whether the git executable can be started.
#[must_use]
pub fn is_git_installed() -> bool {
    which::which(crate::utils::platform::get_git_command()).is_ok()
}

/// Fail with [`DepfetchError::GitNotFound`] when git is missing.
pub fn ensure_git_available() -> Result<()> {
    if !is_git_installed() {
        return Err(DepfetchError::GitNotFound.into());
    }
    Ok(())
}
