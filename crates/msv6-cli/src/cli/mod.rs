//! CLI for the msv6 repository download assistant.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use msv6_core::config;
use msv6_core::plan::RepoType;
use std::path::PathBuf;

use commands::{run_completions, run_download, run_man, run_plan};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "msv6", version)]
#[command(about = "msv6: plan and download registry repositories over IPv4/IPv6", long_about = None)]
pub struct Cli {
    /// Debug-level logging.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Same as --debug.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Prefer IPv6 for registry and file requests (falls back to IPv4 unless an entry is IPv6-only).
    #[arg(long, global = true)]
    pub ipv6: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// List a repository and write a download plan.
    Plan(PlanArgs),

    /// Execute a download plan.
    Download(DownloadArgs),

    /// Print a shell completion script to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print the man page (roff) to stdout.
    Man,
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Repository id, `owner/name`.
    #[arg(long, value_name = "OWNER/NAME")]
    pub repo_id: String,

    #[arg(long, default_value = "model", value_name = "model|dataset")]
    pub repo_type: RepoType,

    /// Plan file to write (default: `{repo_type}__{owner}__{name}.json` in the current directory).
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Keep only files matching this glob (repeatable).
    #[arg(long = "allow-pattern", value_name = "GLOB")]
    pub allow_patterns: Vec<String>,

    /// Drop files matching this glob, even if allowed (repeatable).
    #[arg(long = "ignore-pattern", value_name = "GLOB")]
    pub ignore_patterns: Vec<String>,

    /// Print the selected files instead of writing a plan.
    #[arg(long)]
    pub dry_run: bool,

    /// Registry base URL (overrides config).
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Repository revision (overrides config).
    #[arg(long, value_name = "REV")]
    pub revision: Option<String>,
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Plan file written by `msv6 plan`.
    #[arg(long, value_name = "PATH")]
    pub plan: PathBuf,

    /// Destination root; entry paths are created below it.
    #[arg(long, value_name = "DIR")]
    pub local_dir: PathBuf,

    /// Concurrent downloads (default from config).
    #[arg(long, short = 'j', value_name = "N")]
    pub workers: Option<usize>,

    /// Refetch files even if they already exist.
    #[arg(long)]
    pub overwrite: bool,

    /// Ask the server about files that already have the planned size instead of skipping them.
    #[arg(long)]
    pub no_skip_existing: bool,

    /// Only fetch entries with a raw URL, through that URL.
    #[arg(long, conflicts_with = "only_no_raw")]
    pub only_raw: bool,

    /// Only fetch entries without a raw URL.
    #[arg(long)]
    pub only_no_raw: bool,

    /// Per-file connect/stall timeout in seconds (default from config).
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

impl Cli {
    pub fn debug_logging(&self) -> bool {
        self.debug || self.verbose
    }

    /// Runs the selected command and returns the process exit code.
    pub async fn run(self) -> Result<i32> {
        match self.command {
            CliCommand::Completions { shell } => run_completions(shell),
            CliCommand::Man => run_man(),
            CliCommand::Plan(args) => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_plan(&cfg, args, self.ipv6).await
            }
            CliCommand::Download(args) => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_download(&cfg, args, self.ipv6).await
            }
        }
    }
}

#[cfg(test)]
mod tests;
