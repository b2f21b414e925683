use super::CliConfig;
use crate::config::{GlobalConfig, Options};
use crate::core::DepfetchError;
use crate::manager::{Collaborators, ResolvedSet, resolve};
use crate::manifest::{DECLARATIONS_FILE, load_declarations};
use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One `name -> path` line per dependency
    #[default]
    Text,
    /// A JSON object keyed by name
    Json,
}

/// Options shared by `resolve` and `load`.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Project directory
    #[arg(long, env = "DEPFETCH_PROJECT_DIR", default_value = ".")]
    pub project_dir: PathBuf,

    /// Declaration file (default: <project-dir>/resolve.json)
    #[arg(long)]
    pub declarations: Option<PathBuf>,

    /// Cache directory for fetched dependencies
    #[arg(long, env = "DEPFETCH_RESOLVE_PATH")]
    pub resolve_path: Option<String>,

    /// Directory of stable per-dependency links
    #[arg(long, env = "DEPFETCH_SYMLINKS_PATH")]
    pub symlinks_path: Option<String>,

    /// Do not create stable links
    #[arg(long, conflicts_with = "symlinks_path")]
    pub no_symlinks: bool,

    /// Directory of resolve records
    #[arg(long, env = "DEPFETCH_RECORDS_PATH")]
    pub records_path: Option<String>,

    /// Skip dependencies marked internal
    #[arg(long)]
    pub skip_internal: bool,

    /// Use a local folder for a dependency (NAME=PATH)
    #[arg(long = "path", value_name = "NAME=PATH")]
    pub paths: Vec<String>,

    /// Enable an optional dependency
    #[arg(long = "enable", value_name = "NAME")]
    pub enable: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl CommonArgs {
    /// Options from the built-in defaults, the global configuration and these flags.
    ///
    /// # Errors
    ///
    /// An unreadable global configuration or a malformed `NAME=VALUE` flag.
    pub fn options(&self, config: &CliConfig) -> Result<Options> {
        let global = GlobalConfig::load_with_optional(config.config_path.clone())?;
        let mut options = Options::new(&self.project_dir);
        options.apply_global(&global)?;

        if let Some(path) = &self.resolve_path {
            options.set("resolve_path", path)?;
        }
        if let Some(path) = &self.symlinks_path {
            options.set("symlinks_path", path)?;
        }
        if self.no_symlinks {
            options.symlinks_path = None;
        }
        if let Some(path) = &self.records_path {
            options.set("records_path", path)?;
        }
        options.skip_internal = self.skip_internal;
        for assignment in &self.paths {
            let (name, path) = split_assignment("--path", assignment)?;
            options.set(&format!("{name}_path"), path)?;
        }
        options.enabled.extend(self.enable.iter().cloned());
        Ok(options)
    }

    fn declarations_file(&self) -> PathBuf {
        self.declarations.clone().unwrap_or_else(|| self.project_dir.join(DECLARATIONS_FILE))
    }

    fn run(&self, options: Options) -> Result<()> {
        let file = self.declarations_file();
        debug!(file = %file.display(), "Reading declarations");
        let declarations = load_declarations(&file)?;
        let collaborators = Collaborators::system(&options)?;
        let resolved = resolve(&declarations, options, collaborators)?;
        print_resolved(&resolved, self.format)
    }
}

/// Resolve the declared dependencies.
#[derive(Args, Debug, Clone, Default)]
pub struct ResolveCommand {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Protocol used for protocol-less git sources
    #[arg(long, env = "DEPFETCH_GIT_PROTOCOL")]
    pub git_protocol: Option<String>,

    /// Write a path lock
    #[arg(long, conflicts_with = "lock_versions")]
    pub lock_paths: bool,

    /// Write a version lock
    #[arg(long)]
    pub lock_versions: bool,

    /// Check out a specific ref for a git dependency (NAME=REF)
    #[arg(long = "checkout", value_name = "NAME=REF")]
    pub checkouts: Vec<String>,

    /// Tag registry document used to skip fetches of known tags
    #[arg(long, env = "DEPFETCH_TAGS_URL")]
    pub tags_url: Option<String>,
}

impl ResolveCommand {
    /// Options for this invocation.
    ///
    /// # Errors
    ///
    /// See [`CommonArgs::options`].
    pub fn options(&self, config: &CliConfig) -> Result<Options> {
        let mut options = self.common.options(config)?;
        if let Some(protocol) = &self.git_protocol {
            options.set("git_protocol", protocol)?;
        }
        if let Some(url) = &self.tags_url {
            options.set("tags_url", url)?;
        }
        options.lock_paths = self.lock_paths;
        options.lock_versions = self.lock_versions;
        for assignment in &self.checkouts {
            let (name, reference) = split_assignment("--checkout", assignment)?;
            options.set(&format!("{name}_checkout"), reference)?;
        }
        Ok(options)
    }

    /// Run the command.
    ///
    /// # Errors
    ///
    /// Any fatal error of the resolution pass.
    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        let options = self.options(config)?;
        self.common.run(options)
    }
}

/// Replay the resolve records of the previous run.
#[derive(Args, Debug, Clone, Default)]
pub struct LoadCommand {
    #[command(flatten)]
    pub common: CommonArgs,
}

impl LoadCommand {
    /// Options for this invocation.
    ///
    /// # Errors
    ///
    /// See [`CommonArgs::options`].
    pub fn options(&self, config: &CliConfig) -> Result<Options> {
        let mut options = self.common.options(config)?;
        options.load = true;
        Ok(options)
    }

    /// Run the command.
    ///
    /// # Errors
    ///
    /// A missing or stale record for a required dependency.
    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        let options = self.options(config)?;
        self.common.run(options)
    }
}

fn split_assignment<'a>(flag: &str, value: &'a str) -> Result<(&'a str, &'a str)> {
    match value.split_once('=') {
        Some((name, rest)) if !name.is_empty() && !rest.is_empty() => Ok((name, rest)),
        _ => Err(DepfetchError::Config {
            message: format!("{flag} expects NAME=VALUE, got '{value}'"),
        }
        .into()),
    }
}

fn print_resolved(resolved: &ResolvedSet, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(resolved)?),
        OutputFormat::Text => {
            if resolved.is_empty() {
                println!("{}", "No dependencies resolved".yellow());
            }
            for (name, dependency) in resolved.iter() {
                println!("{} -> {}", name.green(), dependency.path.display());
            }
        }
    }
    Ok(())
}
