//! CLI argument definitions for `shipwright`.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::pipeline::{RunParams, default_jobs};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use shipwright_common::Config;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Build, package and publish a project for every target in its matrix.
#[derive(Parser, Debug)]
#[command(name = "shipwright")]
#[command(version, about)]
#[command(long_about = concat!(
    "Build, package and publish a project for every target in its matrix.\n\n",
    "`shipwright ci` compiles every configured target and publishes nothing. ",
    "`shipwright release --tag v1.4.0` compiles the same matrix, packages each ",
    "binary with its extra files and a SHA-256 checksum, and publishes every ",
    "artefact as one release. A release is all-or-nothing: if any target fails ",
    "to build or package, nothing is published.\n\n",
    "Configuration is read from shipwright.toml; run `shipwright init` to create one.",
))]
#[command(after_help = concat!(
    "EXIT CODES:\n",
    "  0  success, or nothing to run\n",
    "  1  a CI target failed, a release aborted, or publishing failed\n",
    "  2  configuration or usage error\n\n",
    "EXAMPLES:\n",
    "  Create a starter configuration:\n",
    "    $ shipwright init\n\n",
    "  Build every target:\n",
    "    $ shipwright ci --jobs 4\n\n",
    "  Release a tag:\n",
    "    $ shipwright release --tag v1.4.0\n\n",
    "  Dispatch on a pushed ref:\n",
    "    $ shipwright run --ref \"$GITHUB_REF\"\n\n",
    "  Check a downloaded archive:\n",
    "    $ shipwright verify rask-v1.4.0-linux-x86_64.tar.gz",
))]
pub struct Cli {
    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file, or a directory containing shipwright.toml.
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet",
        global = true
    )]
    pub verbosity: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbosity", global = true)]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build every target without publishing.
    Ci(RunArgs),

    /// Build, package and publish a release.
    Release(ReleaseArgs),

    /// Run CI or a release depending on a pushed git ref.
    Run(TriggerArgs),

    /// Show the configured target matrix.
    List(ListArgs),

    /// Write a starter shipwright.toml.
    Init(InitArgs),

    /// Check an archive against its checksum file.
    Verify(VerifyArgs),
}

/// Options for commands that build the matrix.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Number of targets built concurrently [default: available parallelism].
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<NonZeroUsize>,

    /// Per-target build timeout in seconds.
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Timeout for the whole run in seconds.
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub run_timeout: Option<u64>,

    /// Source tree to build [default: the configuration file's directory].
    #[arg(long, value_name = "DIR")]
    pub source: Option<Utf8PathBuf>,

    /// Print the final report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Options for the release command.
#[derive(Args, Debug, Clone)]
pub struct ReleaseArgs {
    /// Release tag, e.g. v1.4.0.
    #[arg(short, long, value_name = "TAG")]
    pub tag: String,

    /// Directory receiving archives and checksum files.
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<Utf8PathBuf>,

    /// Build options.
    #[command(flatten)]
    pub run: RunArgs,
}

/// Options for the trigger dispatcher.
#[derive(Args, Debug, Clone)]
pub struct TriggerArgs {
    /// Fully qualified git ref, e.g. refs/heads/main or refs/tags/v1.4.0.
    #[arg(long = "ref", value_name = "REF")]
    pub git_ref: String,

    /// Directory receiving archives and checksum files.
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<Utf8PathBuf>,

    /// Build options.
    #[command(flatten)]
    pub run: RunArgs,
}

/// Options for the list command.
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Output in JSON format for scripting.
    #[arg(long)]
    pub json: bool,
}

/// Options for the init command.
#[derive(Args, Debug, Clone)]
pub struct InitArgs {
    /// Directory (or file path) for the new configuration.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub entry: Utf8PathBuf,

    /// Project name [default: the directory name].
    #[arg(value_name = "NAME")]
    pub name: Option<String>,
}

/// Options for the verify command.
#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Archive to check.
    #[arg(value_name = "ARCHIVE")]
    pub archive: Utf8PathBuf,

    /// Checksum file [default: ARCHIVE.sha256].
    #[arg(long, value_name = "FILE")]
    pub checksum: Option<Utf8PathBuf>,
}

impl RunArgs {
    /// Run parameters for `config` with command-line overrides applied.
    ///
    /// Flags win over file values; the job count falls back to the
    /// machine's available parallelism.
    #[must_use]
    pub fn params(&self, config: &Config) -> RunParams {
        RunParams {
            matrix: config.matrix.clone(),
            source_root: self
                .source
                .clone()
                .unwrap_or_else(|| config.root.clone()),
            build_timeout: self
                .timeout
                .map_or(config.build.timeout, Duration::from_secs),
            run_timeout: self
                .run_timeout
                .map(Duration::from_secs)
                .or(config.build.run_timeout),
            jobs: self.jobs.or(config.build.jobs).unwrap_or_else(default_jobs),
        }
    }
}

impl GlobalArgs {
    /// The configuration entry point: `--config` or the working directory.
    #[must_use]
    pub fn config_entry(&self) -> Utf8PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| Utf8PathBuf::from("."))
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
