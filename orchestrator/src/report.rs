//! Final run reports.
//!
//! Both orchestrators end with a report that enumerates every target with its
//! terminal status, diagnostic and (for releases) artefact paths. Reports
//! render as plain text or as JSON.

use crate::ci::{CiOutcome, CiReport};
use crate::pipeline::{MatrixRun, TargetState};
use crate::release::{ReleaseOutcome, ReleaseReport};
use camino::Utf8PathBuf;
use serde::Serialize;
use std::fmt::Write as _;

/// Which entry point produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    /// A CI check.
    Ci,
    /// A release run.
    Release,
}

/// One target's line in the final report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetReport {
    /// Display name.
    pub name: String,
    /// Target triple.
    pub triple: String,
    /// Terminal state label.
    pub status: &'static str,
    /// Failure diagnostic, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Archive path for packaged targets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<Utf8PathBuf>,
    /// Checksum file path for packaged targets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_file: Option<Utf8PathBuf>,
    /// Archive digest for packaged targets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Summary of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// The entry point.
    pub kind: RunKind,
    /// Release tag, for release runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Outcome label, e.g. `all_passed` or `release_aborted`.
    pub outcome: &'static str,
    /// Whether the run met its goal.
    pub success: bool,
    /// Where the release was published.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Publish failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Whether the run timeout fired.
    pub timed_out: bool,
    /// Every target in matrix order.
    pub targets: Vec<TargetReport>,
}

impl RunReport {
    /// Summarise a CI run.
    #[must_use]
    pub fn from_ci(report: &CiReport) -> Self {
        let outcome = match report.outcome {
            CiOutcome::AllPassed => "all_passed",
            CiOutcome::SomeFailed { .. } => "some_failed",
        };
        Self {
            kind: RunKind::Ci,
            tag: None,
            outcome,
            success: report.passed(),
            location: None,
            reason: None,
            timed_out: report.run.timed_out,
            targets: target_reports(&report.run),
        }
    }

    /// Summarise a release run.
    #[must_use]
    pub fn from_release(report: &ReleaseReport) -> Self {
        let (outcome, location, reason) = match &report.outcome {
            ReleaseOutcome::Published(receipt) => {
                ("published", Some(receipt.location.clone()), None)
            }
            ReleaseOutcome::ReleaseAborted { .. } => ("release_aborted", None, None),
            ReleaseOutcome::PublishFailed { reason } => {
                ("publish_failed", None, Some(reason.clone()))
            }
        };
        Self {
            kind: RunKind::Release,
            tag: Some(report.tag.to_string()),
            outcome,
            success: report.published(),
            location,
            reason,
            timed_out: report.run.timed_out,
            targets: target_reports(&report.run),
        }
    }

    /// Process exit code for this run: `0` on success, `1` otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.success)
    }

    /// Render the report as indented text.
    #[must_use]
    pub fn render_human(&self) -> String {
        let mut out = String::new();
        let heading = match (&self.kind, &self.tag) {
            (RunKind::Release, Some(tag)) => format!("Release {tag}"),
            _ => "CI check".to_owned(),
        };
        let _ = writeln!(out, "{heading}: {}", self.outcome.replace('_', " "));
        if self.timed_out {
            let _ = writeln!(out, "  run timeout reached");
        }
        if let Some(location) = &self.location {
            let _ = writeln!(out, "  published to {location}");
        }
        if let Some(reason) = &self.reason {
            let _ = writeln!(out, "  publish failed: {reason}");
        }
        out.push('\n');

        for target in &self.targets {
            let _ = writeln!(
                out,
                "  {:<15} {} ({})",
                target.status, target.name, target.triple
            );
            if let Some(detail) = &target.detail {
                for line in detail.lines() {
                    let _ = writeln!(out, "      {line}");
                }
            }
            if let (Some(archive), Some(sha256)) = (&target.archive, &target.sha256) {
                let _ = writeln!(out, "      {archive}");
                let _ = writeln!(out, "      sha256 {sha256}");
            }
        }
        out
    }

    /// Render the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns the serialisation error if the report cannot be rendered.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn target_reports(run: &MatrixRun) -> Vec<TargetReport> {
    run.statuses
        .iter()
        .map(|status| {
            let mut report = TargetReport {
                name: status.target.display_name().to_owned(),
                triple: status.target.triple().to_string(),
                status: status.state.label(),
                detail: status.state.failure_detail().map(str::to_owned),
                archive: None,
                checksum_file: None,
                sha256: None,
            };
            if let TargetState::Packaged(artefact) = &status.state {
                report.archive = Some(artefact.archive_path.clone());
                report.checksum_file = Some(artefact.checksum_path.clone());
                report.sha256 = Some(artefact.digest.to_string());
            }
            report
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{TargetFailure, TargetStatus};
    use crate::publish::PublishReceipt;
    use rstest::rstest;
    use shipwright_common::{ReleaseTag, TargetSpec, TargetTriple};

    fn status(name: &str, triple: &str, state: TargetState) -> TargetStatus {
        TargetStatus {
            target: TargetSpec::new(name, TargetTriple::try_from(triple).expect("triple"), None),
            state,
            finished: true,
        }
    }

    fn failing_run() -> MatrixRun {
        MatrixRun {
            statuses: vec![
                status(
                    "Linux",
                    "x86_64-unknown-linux-gnu",
                    TargetState::Built {
                        binary: Utf8PathBuf::from("/build/rask"),
                    },
                ),
                status(
                    "Windows",
                    "x86_64-pc-windows-msvc",
                    TargetState::BuildFailed {
                        detail: "error[E0433]: failed to resolve\nsecond line".to_owned(),
                    },
                ),
            ],
            timed_out: false,
        }
    }

    #[test]
    fn ci_report_lists_every_target() {
        let run = failing_run();
        let ci = CiReport {
            outcome: CiOutcome::SomeFailed {
                failures: run.failures(),
            },
            run,
        };

        let report = RunReport::from_ci(&ci);
        assert_eq!(report.exit_code(), 1);
        let text = report.render_human();
        assert!(text.starts_with("CI check: some failed"));
        assert!(text.contains("built           Linux (x86_64-unknown-linux-gnu)"));
        assert!(text.contains("build_failed    Windows (x86_64-pc-windows-msvc)"));
        assert!(text.contains("      second line"));
    }

    #[rstest]
    #[case::published(
        ReleaseOutcome::Published(PublishReceipt {
            location: "releases/v1.4.0".to_owned(),
            assets: 4,
        }),
        "published",
        0
    )]
    #[case::publish_failed(
        ReleaseOutcome::PublishFailed { reason: "503".to_owned() },
        "publish_failed",
        1
    )]
    #[case::aborted(
        ReleaseOutcome::ReleaseAborted { failures: Vec::<TargetFailure>::new() },
        "release_aborted",
        1
    )]
    fn release_outcome_labels(
        #[case] outcome: ReleaseOutcome,
        #[case] label: &str,
        #[case] exit_code: i32,
    ) {
        let release = ReleaseReport {
            tag: ReleaseTag::parse("v1.4.0", "v").expect("tag"),
            outcome,
            run: failing_run(),
        };

        let report = RunReport::from_release(&release);
        assert_eq!(report.outcome, label);
        assert_eq!(report.exit_code(), exit_code);
        assert!(report.render_human().starts_with("Release v1.4.0"));
    }

    #[test]
    fn json_report_omits_absent_fields() {
        let run = failing_run();
        let ci = CiReport {
            outcome: CiOutcome::SomeFailed {
                failures: run.failures(),
            },
            run,
        };

        let json = RunReport::from_ci(&ci).to_json().expect("json");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");
        assert_eq!(parsed["kind"], "ci");
        assert!(parsed.get("tag").is_none());
        assert!(parsed["targets"][0].get("detail").is_none());
        assert_eq!(parsed["targets"][1]["status"], "build_failed");
    }
}
