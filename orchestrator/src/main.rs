//! `shipwright` CLI entrypoint.
//!
//! This binary loads `shipwright.toml`, runs the CI check or the release
//! procedure over the configured target matrix, and prints a report that
//! enumerates every target.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::info;
use shipwright_common::config::{PublishSink, resolve_config_path};
use shipwright_common::scaffold::scaffold;
use shipwright_common::{Config, ReleaseTag};
use shipwright_orchestrator::artefact::Packager;
use shipwright_orchestrator::artefact::checksum::{checksum_path_for, verify_checksum_file};
use shipwright_orchestrator::builder::CargoBuildStep;
use shipwright_orchestrator::ci::CiOrchestrator;
use shipwright_orchestrator::cli::{
    Cli, Command, InitArgs, ListArgs, ReleaseArgs, RunArgs, TriggerArgs, VerifyArgs,
};
use shipwright_orchestrator::error::{CliError, Result};
use shipwright_orchestrator::list_output::{format_human, format_json};
use shipwright_orchestrator::logging;
use shipwright_orchestrator::publish::github::GitHubApi;
use shipwright_orchestrator::publish::{
    DirectoryPublisher, GitHubNotes, GitHubPublisher, NotesGenerator, Publisher, StaticNotes,
};
use shipwright_orchestrator::release::{ReleaseOrchestrator, ReleasePlan};
use shipwright_orchestrator::report::RunReport;
use shipwright_orchestrator::trigger::{Trigger, classify};
use std::io::Write;
use std::sync::Arc;

/// Environment variable holding the GitHub token for the `github` sink.
const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

fn main() {
    let cli = Cli::parse();
    logging::init(cli.global.verbosity, cli.global.quiet);
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<i32> {
    match &cli.command {
        Command::Init(args) => init(args, stderr).map(|()| 0),
        Command::Verify(args) => verify(args, stdout).map(|()| 0),
        Command::List(args) => {
            let config = load_config(&cli.global.config_entry())?;
            list(&config, args, stdout).map(|()| 0)
        }
        Command::Ci(args) => {
            let config = load_config(&cli.global.config_entry())?;
            run_ci(&config, args, stdout)
        }
        Command::Release(args) => {
            let config = load_config(&cli.global.config_entry())?;
            let tag = ReleaseTag::parse(&args.tag, &config.triggers.tag_prefix)?;
            run_release(&config, tag, args, stdout)
        }
        Command::Run(args) => {
            let config = load_config(&cli.global.config_entry())?;
            dispatch(&config, args, stdout, stderr)
        }
    }
}

/// Resolves and loads the configuration from a file or directory.
fn load_config(entry: &Utf8Path) -> Result<Config> {
    let path = resolve_config_path(entry)?;
    Ok(Config::load(&path)?)
}

/// Runs whatever the pushed ref calls for.
fn dispatch(
    config: &Config,
    args: &TriggerArgs,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<i32> {
    match classify(&args.git_ref, &config.triggers) {
        Trigger::Ci { branch } => {
            info!("push to {branch}: running CI");
            run_ci(config, &args.run, stdout)
        }
        Trigger::Release(tag) => {
            info!("tag {tag}: running release");
            let release = ReleaseArgs {
                tag: tag.to_string(),
                output_dir: args.output_dir.clone(),
                run: args.run.clone(),
            };
            run_release(config, tag, &release, stdout)
        }
        Trigger::Skip { reason } => {
            write_stderr_line(stderr, format!("Nothing to run: {reason}"));
            Ok(0)
        }
    }
}

fn run_ci(config: &Config, args: &RunArgs, stdout: &mut dyn Write) -> Result<i32> {
    let builder = CargoBuildStep::new(&config.build, config.project.binary.clone());
    let orchestrator = CiOrchestrator::new(args.params(config), Arc::new(builder));
    let report = RunReport::from_ci(&orchestrator.run());
    emit_report(&report, args.json, stdout)?;
    Ok(report.exit_code())
}

fn run_release(
    config: &Config,
    tag: ReleaseTag,
    args: &ReleaseArgs,
    stdout: &mut dyn Write,
) -> Result<i32> {
    // Fail before any build if a target cannot be packaged.
    config.matrix.require_archive_formats()?;
    let (notes, publisher) = release_sink(config)?;

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.package.output_dir.clone());
    let plan = ReleasePlan {
        packager: Packager::new(output_dir, config.project.name.clone(), tag.clone()),
        tag,
        extra_files: config.package.extra_files.clone(),
    };
    let builder = CargoBuildStep::new(&config.build, config.project.binary.clone());

    let orchestrator = ReleaseOrchestrator::new(
        args.run.params(config),
        plan,
        Arc::new(builder),
        notes,
        publisher,
    );
    let report = RunReport::from_release(&orchestrator.run());
    emit_report(&report, args.run.json, stdout)?;
    Ok(report.exit_code())
}

/// Selects the notes generator and publisher for the configured sink.
fn release_sink(config: &Config) -> Result<(Box<dyn NotesGenerator>, Box<dyn Publisher>)> {
    let static_notes = || {
        StaticNotes::new(
            config.project.name.clone(),
            config.publish.notes_file.clone(),
        )
    };

    match &config.publish.sink {
        PublishSink::Directory { root } => Ok((
            Box::new(static_notes()),
            Box::new(DirectoryPublisher::new(root.clone())),
        )),
        PublishSink::GitHub {
            repository,
            api_url,
        } => {
            let token = std::env::var(GITHUB_TOKEN_ENV).map_err(|_| CliError::MissingEnv {
                name: GITHUB_TOKEN_ENV,
                sink: "github",
            })?;
            let api = GitHubApi::new(api_url, repository.clone(), token);
            let notes: Box<dyn NotesGenerator> = if config.publish.notes_file.is_some() {
                Box::new(static_notes())
            } else {
                Box::new(GitHubNotes::new(api.clone()))
            };
            Ok((notes, Box::new(GitHubPublisher::new(api))))
        }
    }
}

fn list(config: &Config, args: &ListArgs, stdout: &mut dyn Write) -> Result<()> {
    let output = if args.json {
        format_json(config)?
    } else {
        format_human(config)
    };
    write_output(stdout, &output)
}

fn init(args: &InitArgs, stderr: &mut dyn Write) -> Result<()> {
    let path = scaffold(&args.entry, args.name.as_deref())?;
    write_stderr_line(stderr, format!("Created {path}"));
    write_stderr_line(stderr, "Edit the [[targets]] entries, then run: shipwright ci");
    Ok(())
}

fn verify(args: &VerifyArgs, stdout: &mut dyn Write) -> Result<()> {
    let checksum: Utf8PathBuf = args
        .checksum
        .clone()
        .unwrap_or_else(|| checksum_path_for(&args.archive));
    let digest = verify_checksum_file(&args.archive, &checksum)?;
    write_output(stdout, &format!("{}: OK ({digest})", args.archive))
}

fn emit_report(report: &RunReport, json: bool, stdout: &mut dyn Write) -> Result<()> {
    let output = if json {
        report.to_json()?
    } else {
        report.render_human()
    };
    write_output(stdout, &output)
}

fn write_output(stdout: &mut dyn Write, output: &str) -> Result<()> {
    writeln!(stdout, "{}", output.trim_end()).map_err(|source| CliError::WriteFailed { source })
}

fn exit_code_for_run_result(result: Result<i32>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(code) => code,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            err.exit_code()
        }
    }
}

fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipwright_common::ConfigError;
    use std::fs;
    use tempfile::TempDir;

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir")
    }

    #[test]
    fn exit_code_for_run_result_passes_through_run_codes() {
        let mut stderr = Vec::new();
        assert_eq!(exit_code_for_run_result(Ok(0), &mut stderr), 0);
        assert_eq!(exit_code_for_run_result(Ok(1), &mut stderr), 1);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_config_errors_with_code_two() {
        let mut stderr = Vec::new();
        let err = CliError::from(ConfigError::EmptyMatrix);
        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
        assert_eq!(exit_code, 2);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(stderr_text.starts_with("error: target matrix is empty"));
    }

    #[test]
    fn missing_configuration_is_a_config_error() {
        let dir = TempDir::new().expect("temp dir");
        let err = load_config(&utf8(&dir)).expect_err("no config");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn init_then_list_shows_the_default_matrix() {
        let dir = TempDir::new().expect("temp dir");
        let root = utf8(&dir);
        let mut stderr = Vec::new();
        init(
            &InitArgs {
                entry: root.clone(),
                name: Some("rask".to_owned()),
            },
            &mut stderr,
        )
        .expect("init");

        let config = load_config(&root).expect("config");
        let mut stdout = Vec::new();
        list(&config, &ListArgs { json: false }, &mut stdout).expect("list");
        let text = String::from_utf8(stdout).expect("utf8");
        assert!(text.contains("x86_64-pc-windows-msvc"));
        assert!(text.contains("aarch64-apple-darwin"));
    }

    #[test]
    fn verify_reports_tampered_archive() {
        let dir = TempDir::new().expect("temp dir");
        let root = utf8(&dir);
        let archive = root.join("rask.tar.gz");
        fs::write(&archive, b"original").expect("write");
        let digest =
            shipwright_orchestrator::artefact::checksum::compute_sha256(&archive).expect("digest");
        shipwright_orchestrator::artefact::checksum::write_checksum_file(&archive, &digest)
            .expect("checksum");

        let args = VerifyArgs {
            archive: archive.clone(),
            checksum: None,
        };
        let mut stdout = Vec::new();
        verify(&args, &mut stdout).expect("verifies");
        assert!(String::from_utf8_lossy(&stdout).contains(": OK ("));

        fs::write(&archive, b"tampered").expect("overwrite");
        let err = verify(&args, &mut Vec::new()).expect_err("mismatch");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn excluded_branch_is_skipped_without_building() {
        let dir = TempDir::new().expect("temp dir");
        let root = utf8(&dir);
        fs::write(
            root.join("shipwright.toml"),
            r#"
[project]
name = "rask"

[triggers]
exclude_branches = ["gh-pages"]

[[targets]]
name = "Linux"
triple = "x86_64-unknown-linux-gnu"
"#,
        )
        .expect("write config");
        let config = load_config(&root).expect("config");
        let args = TriggerArgs {
            git_ref: "refs/heads/gh-pages".to_owned(),
            output_dir: None,
            run: RunArgs::default(),
        };

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let code = dispatch(&config, &args, &mut stdout, &mut stderr).expect("dispatch");
        assert_eq!(code, 0);
        assert!(stdout.is_empty());
        assert!(String::from_utf8_lossy(&stderr).contains("excluded"));
    }

    #[test]
    fn release_without_archive_format_fails_before_building() {
        let dir = TempDir::new().expect("temp dir");
        let root = utf8(&dir);
        fs::write(
            root.join("shipwright.toml"),
            r#"
[project]
name = "rask"

[[targets]]
name = "Linux"
triple = "x86_64-unknown-linux-gnu"
"#,
        )
        .expect("write config");
        let config = load_config(&root).expect("config");
        let tag = ReleaseTag::parse("v1.0.0", "v").expect("tag");
        let args = ReleaseArgs {
            tag: tag.to_string(),
            output_dir: None,
            run: RunArgs::default(),
        };

        let err = run_release(&config, tag, &args, &mut Vec::new()).expect_err("no format");
        assert_eq!(err.exit_code(), 2);
        assert!(!root.join("dist").exists());
    }
}
