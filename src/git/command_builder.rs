//! Builder for system `git` invocations with consistent logging and error mapping.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::core::DepfetchError;
use crate::utils::platform::get_git_command;

/// Fluent builder for one `git` command.
///
/// Commands run with `-C <dir>` instead of changing the process directory, never prompt for
/// credentials (`GIT_TERMINAL_PROMPT=0`) and capture their output. Failures are mapped onto
/// [`DepfetchError`] variants: clone failures become [`DepfetchError::GitCloneFailed`], checkout
/// failures [`DepfetchError::GitCheckoutFailed`], everything else
/// [`DepfetchError::GitCommandError`].
///
/// # Examples
///
/// ```rust,no_run
/// use depfetch::git::command_builder::GitCommand;
/// use std::path::Path;
///
/// # fn example() -> anyhow::Result<()> {
/// let tags = GitCommand::list_tags()
///     .current_dir(Path::new("resolved_dependencies/waf-1a2b3c/master"))
///     .execute_stdout()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct GitCommand {
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env_vars: Vec<(String, String)>,
    context: Option<String>,
    clone_url: Option<String>,
}

/// Captured output of a successful command.
#[derive(Debug)]
pub struct GitCommandOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error (git writes progress here)
    pub stderr: String,
}

impl GitCommand {
    /// Empty command.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the command inside `dir` (passed as `-C dir`).
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the git process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Label used in log lines, usually the dependency name.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Run the command and capture its output.
    ///
    /// # Errors
    ///
    /// [`DepfetchError::GitNotFound`] when git cannot be started, otherwise a git error variant
    /// carrying stderr when the command exits unsuccessfully.
    pub fn execute(self) -> Result<GitCommandOutput> {
        let start = std::time::Instant::now();
        let git_command = get_git_command();

        let mut full_args = Vec::new();
        if let Some(ref dir) = self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());

        let context = self.context.as_deref().unwrap_or("git");
        tracing::debug!(target: "git", "({}) Executing command: {} {}", context, git_command, full_args.join(" "));

        let mut cmd = Command::new(git_command);
        cmd.args(&full_args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.env_vars {
            tracing::trace!(target: "git", "Setting env var: {}={}", key, value);
            cmd.env(key, value);
        }

        let output = match cmd.output() {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DepfetchError::GitNotFound.into());
            }
            Err(e) => {
                return Err(e).context(format!("Failed to execute git {}", full_args.join(" ")));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let operation = self.args.first().cloned().unwrap_or_else(|| "unknown".to_string());

        if !output.status.success() {
            tracing::debug!(
                target: "git",
                "({}) Command failed with exit code {:?}: {}",
                context,
                output.status.code(),
                stderr.trim()
            );

            let reason = if stderr.trim().is_empty() { stdout.clone() } else { stderr.clone() };
            let error = match operation.as_str() {
                "clone" => DepfetchError::GitCloneFailed {
                    url: self.clone_url.unwrap_or_else(|| "unknown".to_string()),
                    reason,
                },
                "checkout" => DepfetchError::GitCheckoutFailed {
                    reference: self.args.get(1).cloned().unwrap_or_default(),
                    reason,
                },
                _ => DepfetchError::GitCommandError {
                    operation: self.args.join(" "),
                    stderr: reason,
                },
            };
            return Err(error.into());
        }

        if !stdout.trim().is_empty() {
            tracing::trace!(target: "git", "({}) {}", context, stdout.trim());
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(target: "git::perf", "({}) Git {} took {:.2}s", context, operation, elapsed.as_secs_f64());
        } else if elapsed.as_millis() > 100 {
            tracing::debug!(target: "git::perf", "({}) Git {} took {}ms", context, operation, elapsed.as_millis());
        }

        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Run the command and return trimmed stdout.
    pub fn execute_stdout(self) -> Result<String> {
        Ok(self.execute()?.stdout.trim().to_string())
    }

    /// Run the command, discarding output.
    pub fn execute_success(self) -> Result<()> {
        self.execute().map(|_| ())
    }
}

// Convenience builders for the operations the resolver needs

impl GitCommand {
    /// Full clone of `url` into `target`.
    pub fn clone(url: &str, target: impl AsRef<Path>) -> Self {
        let mut cmd = Self::new().args(["clone", "--no-progress", url]).arg(target.as_ref().display().to_string());
        cmd.clone_url = Some(url.to_string());
        cmd
    }

    /// Fast-forward the current branch and fetch new tags.
    pub fn pull() -> Self {
        Self::new().args(["pull", "--ff-only", "--tags"])
    }

    /// Check out a branch, tag or commit.
    pub fn checkout(ref_name: &str) -> Self {
        Self::new().args(["checkout", ref_name])
    }

    /// List all tags.
    pub fn list_tags() -> Self {
        Self::new().args(["tag", "-l"])
    }

    /// List remote-tracking branches of `origin`.
    pub fn list_remote_branches() -> Self {
        Self::new().args(["branch", "-r", "--format=%(refname:short)"])
    }

    /// Name of the checked-out branch; empty when detached.
    pub fn current_branch() -> Self {
        Self::new().args(["branch", "--show-current"])
    }

    /// Commit id of `HEAD`.
    pub fn current_commit() -> Self {
        Self::rev_parse("HEAD")
    }

    /// Resolve any ref to the commit id it names.
    pub fn rev_parse(ref_name: &str) -> Self {
        Self::new().args(["rev-parse", "--verify", "--quiet"]).arg(format!("{ref_name}^{{commit}}"))
    }

    /// Tags pointing at `HEAD`.
    pub fn tags_at_head() -> Self {
        Self::new().args(["tag", "--points-at", "HEAD"])
    }

    /// Initialise and update submodules recursively.
    pub fn update_submodules() -> Self {
        Self::new().args(["submodule", "update", "--init", "--recursive"])
    }

    /// URL of the `origin` remote.
    pub fn remote_url() -> Self {
        Self::new().args(["remote", "get-url", "origin"])
    }
}
