//! Per-target compilation.
//!
//! The [`BuildStep`] trait is the seam between orchestration and the
//! external toolchain. [`CargoBuildStep`] is the production implementation:
//! it runs the configured build command for one triple with a hard
//! wall-clock timeout and reports a [`BuildResult`].

use crate::pipeline::Cancellation;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use serde::Serialize;
use shipwright_common::TargetSpec;
use shipwright_common::config::BuildSettings;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

/// How often a running build checks for cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Failure detail for a build that exceeded its timeout.
pub const TIMEOUT_DETAIL: &str = "timeout";

/// Failure detail for a build stopped by run cancellation.
pub const CANCELLED_DETAIL: &str = "cancelled";

/// Outcome of one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildOutcome {
    /// The toolchain exited successfully and produced the binary.
    Success,
    /// The build failed, timed out or was cancelled.
    Failure,
}

/// Result of building one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    /// The target that was built.
    pub target: TargetSpec,
    /// Path of the produced binary, present on success.
    pub binary_path: Option<Utf8PathBuf>,
    /// Whether the build succeeded.
    pub outcome: BuildOutcome,
    /// Diagnostic for a failed build.
    pub error_detail: Option<String>,
}

impl BuildResult {
    /// A successful build that produced `binary`.
    #[must_use]
    pub fn success(target: &TargetSpec, binary: Utf8PathBuf) -> Self {
        Self {
            target: target.clone(),
            binary_path: Some(binary),
            outcome: BuildOutcome::Success,
            error_detail: None,
        }
    }

    /// A failed build with its diagnostic.
    #[must_use]
    pub fn failure(target: &TargetSpec, detail: impl Into<String>) -> Self {
        Self {
            target: target.clone(),
            binary_path: None,
            outcome: BuildOutcome::Failure,
            error_detail: Some(detail.into()),
        }
    }

    /// Whether the build succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == BuildOutcome::Success
    }
}

/// Compiles one target.
///
/// Implementations must be safe to call concurrently for different targets
/// and idempotent for the same target and source root.
pub trait BuildStep: Send + Sync {
    /// Build `target` from `source_root`, giving up after `timeout` or when
    /// `cancel` is tripped.
    fn build(
        &self,
        target: &TargetSpec,
        source_root: &Utf8Path,
        timeout: Duration,
        cancel: &Cancellation,
    ) -> BuildResult;
}

/// Runs the configured toolchain command, e.g. `cargo build --release`.
#[derive(Debug, Clone)]
pub struct CargoBuildStep {
    command: String,
    args: Vec<String>,
    profile: String,
    build_dir: Utf8PathBuf,
    binary: String,
}

impl CargoBuildStep {
    /// Create a build step from the `[build]` settings and the binary name.
    #[must_use]
    pub fn new(settings: &BuildSettings, binary: impl Into<String>) -> Self {
        Self {
            command: settings.command.clone(),
            args: settings.args.clone(),
            profile: settings.profile.clone(),
            build_dir: settings.build_dir.clone(),
            binary: binary.into(),
        }
    }

    /// The per-target build directory, passed as `CARGO_TARGET_DIR`.
    #[must_use]
    pub fn target_dir(&self, target: &TargetSpec) -> Utf8PathBuf {
        self.build_dir.join(target.triple().as_str())
    }

    /// Where the binary for `target` lands after a successful build.
    #[must_use]
    pub fn binary_path(&self, target: &TargetSpec) -> Utf8PathBuf {
        let triple = target.triple();
        self.target_dir(target)
            .join(triple.as_str())
            .join(&self.profile)
            .join(format!("{}{}", self.binary, triple.executable_suffix()))
    }

    fn command_for(&self, target: &TargetSpec, source_root: &Utf8Path) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .args(["--target", target.triple().as_str()])
            .env("CARGO_TARGET_DIR", self.target_dir(target).as_str())
            .current_dir(source_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // A group of its own, so a kill reaches the compilers it spawns.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }
}

impl BuildStep for CargoBuildStep {
    fn build(
        &self,
        target: &TargetSpec,
        source_root: &Utf8Path,
        timeout: Duration,
        cancel: &Cancellation,
    ) -> BuildResult {
        let mut cmd = self.command_for(target, source_root);
        debug!("{target}: running {cmd:?}");

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return BuildResult::failure(
                    target,
                    format!("failed to start `{}`: {e}", self.command),
                );
            }
        };
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        // Readers of a killed build are detached rather than joined:
        // grandchildren may still hold the pipes open.
        match wait_for_child(&mut child, timeout, cancel) {
            Ok(Wait::Exited(status)) if status.success() => {
                let binary = self.binary_path(target);
                if binary.is_file() {
                    BuildResult::success(target, binary)
                } else {
                    let stdout = join_output(stdout);
                    let stderr = join_output(stderr);
                    let output = toolchain_output(&stdout, &stderr);
                    BuildResult::failure(
                        target,
                        format!("build succeeded but {binary} was not produced\n{output}"),
                    )
                }
            }
            Ok(Wait::Exited(status)) => {
                let stdout = join_output(stdout);
                let stderr = join_output(stderr);
                BuildResult::failure(target, diagnostic(status, &stdout, &stderr))
            }
            Ok(Wait::TimedOut) => {
                warn!("{target}: build exceeded {}s, killed", timeout.as_secs());
                BuildResult::failure(target, TIMEOUT_DETAIL)
            }
            Ok(Wait::Cancelled) => BuildResult::failure(target, CANCELLED_DETAIL),
            Err(e) => BuildResult::failure(target, format!("failed to wait for build: {e}")),
        }
    }
}

enum Wait {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
}

/// Wait for `child`, killing it on timeout or cancellation.
fn wait_for_child(
    child: &mut Child,
    timeout: Duration,
    cancel: &Cancellation,
) -> std::io::Result<Wait> {
    let deadline = Instant::now() + timeout;
    loop {
        if cancel.is_cancelled() {
            kill(child);
            return Ok(Wait::Cancelled);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            kill(child);
            return Ok(Wait::TimedOut);
        }
        if let Some(status) = child.wait_timeout(remaining.min(POLL_INTERVAL))? {
            return Ok(Wait::Exited(status));
        }
    }
}

/// Kill the build and everything in its process group, then reap it.
fn kill(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
            // SAFETY: `kill` has no memory-safety preconditions. The group id
            // is the child's pid, which stays reserved until the `wait` below.
            unsafe {
                libc::kill(-pgid, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Read a pipe to the end on a helper thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join_output(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// The toolchain's own diagnostic: stderr verbatim, else stdout, else the
/// exit status.
fn diagnostic(status: ExitStatus, stdout: &str, stderr: &str) -> String {
    let output = toolchain_output(stdout, stderr);
    if output.is_empty() {
        format!("build exited with {status}")
    } else {
        output.to_owned()
    }
}

/// Stderr if it holds anything, else stdout, else nothing.
fn toolchain_output<'a>(stdout: &'a str, stderr: &'a str) -> &'a str {
    if !stderr.trim().is_empty() {
        stderr
    } else if !stdout.trim().is_empty() {
        stdout
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use shipwright_common::{ArchiveFormat, TargetTriple};

    #[fixture]
    fn settings() -> BuildSettings {
        BuildSettings {
            command: "cargo".to_owned(),
            args: vec!["build".to_owned(), "--release".to_owned()],
            profile: "release".to_owned(),
            build_dir: Utf8PathBuf::from("/work/target/shipwright"),
            timeout: Duration::from_secs(60),
            run_timeout: None,
            jobs: None,
        }
    }

    fn target(name: &str, triple: &str) -> TargetSpec {
        let triple = TargetTriple::try_from(triple).expect("valid triple");
        TargetSpec::new(name, triple, Some(ArchiveFormat::TarGz))
    }

    #[rstest]
    fn binary_path_is_target_qualified(settings: BuildSettings) {
        let step = CargoBuildStep::new(&settings, "rask");
        let linux = target("Linux", "x86_64-unknown-linux-gnu");
        assert_eq!(
            step.binary_path(&linux),
            Utf8PathBuf::from(
                "/work/target/shipwright/x86_64-unknown-linux-gnu/x86_64-unknown-linux-gnu/release/rask"
            )
        );
    }

    #[rstest]
    fn windows_binary_has_exe_suffix(settings: BuildSettings) {
        let step = CargoBuildStep::new(&settings, "rask");
        let windows = target("Windows", "x86_64-pc-windows-msvc");
        assert_eq!(step.binary_path(&windows).file_name(), Some("rask.exe"));
    }

    #[rstest]
    fn command_appends_target_and_sets_target_dir(settings: BuildSettings) {
        let step = CargoBuildStep::new(&settings, "rask");
        let linux = target("Linux", "x86_64-unknown-linux-gnu");
        let cmd = step.command_for(&linux, Utf8Path::new("/work"));

        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            ["build", "--release", "--target", "x86_64-unknown-linux-gnu"]
        );
        let target_dir = cmd
            .get_envs()
            .find(|(k, _)| *k == "CARGO_TARGET_DIR")
            .and_then(|(_, v)| v)
            .map(|v| v.to_string_lossy().into_owned());
        assert_eq!(
            target_dir.as_deref(),
            Some("/work/target/shipwright/x86_64-unknown-linux-gnu")
        );
    }

    #[rstest]
    fn missing_command_is_a_failure(mut settings: BuildSettings) {
        settings.command = "shipwright-no-such-toolchain".to_owned();
        let step = CargoBuildStep::new(&settings, "rask");
        let linux = target("Linux", "x86_64-unknown-linux-gnu");

        let result = step.build(
            &linux,
            Utf8Path::new("."),
            Duration::from_secs(5),
            &Cancellation::new(),
        );
        assert_eq!(result.outcome, BuildOutcome::Failure);
        assert!(result.binary_path.is_none());
        assert!(
            result
                .error_detail
                .as_deref()
                .is_some_and(|d| d.contains("failed to start"))
        );
    }

    #[cfg(unix)]
    #[rstest]
    #[case::stderr_wins("out", "err", "err")]
    #[case::stdout_fallback("out", "  \n", "out")]
    fn diagnostic_prefers_stderr(
        #[case] stdout: &str,
        #[case] stderr: &str,
        #[case] expected: &str,
    ) {
        use std::os::unix::process::ExitStatusExt;
        let status = ExitStatus::from_raw(1 << 8);
        assert_eq!(diagnostic(status, stdout, stderr), expected);
    }

    #[cfg(unix)]
    #[rstest]
    fn silent_failure_reports_exit_status() {
        use std::os::unix::process::ExitStatusExt;
        let status = ExitStatus::from_raw(101 << 8);
        assert!(diagnostic(status, "", "").contains("101"));
    }

    #[cfg(unix)]
    #[rstest]
    fn slow_build_times_out(mut settings: BuildSettings) {
        settings.command = "sh".to_owned();
        settings.args = vec!["-c".to_owned(), "sleep 5".to_owned(), "sh".to_owned()];
        let step = CargoBuildStep::new(&settings, "rask");
        let linux = target("Linux", "x86_64-unknown-linux-gnu");

        let started = Instant::now();
        let result = step.build(
            &linux,
            Utf8Path::new("."),
            Duration::from_millis(300),
            &Cancellation::new(),
        );
        assert_eq!(result.error_detail.as_deref(), Some(TIMEOUT_DETAIL));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[rstest]
    fn cancelled_build_is_killed(mut settings: BuildSettings) {
        settings.command = "sh".to_owned();
        settings.args = vec!["-c".to_owned(), "sleep 5".to_owned(), "sh".to_owned()];
        let step = CargoBuildStep::new(&settings, "rask");
        let linux = target("Linux", "x86_64-unknown-linux-gnu");
        let cancel = Cancellation::new();
        cancel.cancel();

        let result = step.build(&linux, Utf8Path::new("."), Duration::from_secs(30), &cancel);
        assert_eq!(result.error_detail.as_deref(), Some(CANCELLED_DETAIL));
    }

    #[cfg(unix)]
    #[rstest]
    fn missing_binary_keeps_toolchain_output(mut settings: BuildSettings) {
        let dir = tempfile::TempDir::new().expect("temp dir");
        settings.build_dir = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8");
        settings.command = "sh".to_owned();
        settings.args = vec![
            "-c".to_owned(),
            "echo 'warning: bin target rask skipped' >&2; exit 0".to_owned(),
            "sh".to_owned(),
        ];
        let step = CargoBuildStep::new(&settings, "rask");
        let linux = target("Linux", "x86_64-unknown-linux-gnu");

        let result = step.build(
            &linux,
            Utf8Path::new("."),
            Duration::from_secs(30),
            &Cancellation::new(),
        );
        assert_eq!(result.outcome, BuildOutcome::Failure);
        let detail = result.error_detail.expect("failure detail");
        assert!(detail.contains("was not produced"), "detail: {detail}");
        assert!(
            detail.ends_with("warning: bin target rask skipped\n"),
            "detail: {detail}"
        );
    }

    #[cfg(unix)]
    #[rstest]
    fn timeout_kills_processes_spawned_by_the_build(mut settings: BuildSettings) {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let marker = dir.path().join("late-write");
        settings.command = "sh".to_owned();
        settings.args = vec![
            "-c".to_owned(),
            format!("(sleep 1; echo late > '{}') & wait", marker.display()),
            "sh".to_owned(),
        ];
        let step = CargoBuildStep::new(&settings, "rask");
        let linux = target("Linux", "x86_64-unknown-linux-gnu");

        let result = step.build(
            &linux,
            Utf8Path::new("."),
            Duration::from_millis(200),
            &Cancellation::new(),
        );
        assert_eq!(result.error_detail.as_deref(), Some(TIMEOUT_DETAIL));
        std::thread::sleep(Duration::from_millis(1500));
        assert!(!marker.exists(), "a grandchild outlived the build");
    }

    #[cfg(unix)]
    #[rstest]
    fn failing_build_reports_stderr_verbatim(mut settings: BuildSettings) {
        settings.command = "sh".to_owned();
        settings.args = vec![
            "-c".to_owned(),
            "echo 'error[E0425]: cannot find value' >&2; exit 101".to_owned(),
            "sh".to_owned(),
        ];
        let step = CargoBuildStep::new(&settings, "rask");
        let linux = target("Linux", "x86_64-unknown-linux-gnu");

        let result = step.build(
            &linux,
            Utf8Path::new("."),
            Duration::from_secs(30),
            &Cancellation::new(),
        );
        assert_eq!(
            result.error_detail.as_deref(),
            Some("error[E0425]: cannot find value\n")
        );
    }
}
