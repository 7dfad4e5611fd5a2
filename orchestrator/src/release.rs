//! The release procedure: build, package and publish every target as one
//! versioned release, or publish nothing.

use crate::artefact::Packager;
use crate::builder::BuildStep;
use crate::bundle::ReleaseBundle;
use crate::pipeline::{
    Cancellation, MatrixRun, RunParams, TargetFailure, TargetState, run_matrix,
};
use crate::publish::{NotesGenerator, PublishReceipt, Publisher};
use camino::Utf8PathBuf;
use log::{error, info, warn};
use shipwright_common::ReleaseTag;
use std::sync::Arc;

/// Result of a release run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Every target was packaged and the release was published once.
    Published(PublishReceipt),
    /// At least one target failed or was cancelled; nothing was published.
    ReleaseAborted {
        /// Each failing target with its diagnostic.
        failures: Vec<TargetFailure>,
    },
    /// Every target was packaged but publication failed. Not retried.
    PublishFailed {
        /// Description of the publish error.
        reason: String,
    },
}

/// Outcome plus the per-target statuses it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    /// The release tag.
    pub tag: ReleaseTag,
    /// The run outcome.
    pub outcome: ReleaseOutcome,
    /// Final status of every target.
    pub run: MatrixRun,
}

impl ReleaseReport {
    /// Whether the release was published.
    #[must_use]
    pub fn published(&self) -> bool {
        matches!(self.outcome, ReleaseOutcome::Published(_))
    }
}

/// What a release produces: its tag, the packager and project-wide files.
#[derive(Debug, Clone)]
pub struct ReleasePlan {
    /// The release tag.
    pub tag: ReleaseTag,
    /// Packager configured for the tag and output directory.
    pub packager: Packager,
    /// Files bundled into every archive, before per-target files.
    pub extra_files: Vec<Utf8PathBuf>,
}

/// Runs the all-or-nothing release procedure.
pub struct ReleaseOrchestrator {
    params: RunParams,
    plan: Arc<ReleasePlan>,
    builder: Arc<dyn BuildStep>,
    notes: Box<dyn NotesGenerator>,
    publisher: Box<dyn Publisher>,
    cancel: Cancellation,
}

impl ReleaseOrchestrator {
    /// Create an orchestrator with explicit run parameters and collaborators.
    #[must_use]
    pub fn new(
        params: RunParams,
        plan: ReleasePlan,
        builder: Arc<dyn BuildStep>,
        notes: Box<dyn NotesGenerator>,
        publisher: Box<dyn Publisher>,
    ) -> Self {
        Self {
            params,
            plan: Arc::new(plan),
            builder,
            notes,
            publisher,
            cancel: Cancellation::new(),
        }
    }

    /// Flag that stops the run when tripped.
    #[must_use]
    pub fn cancellation(&self) -> Cancellation {
        self.cancel.clone()
    }

    /// Build and package every target, then publish if all succeeded.
    #[must_use]
    pub fn run(&self) -> ReleaseReport {
        let tag = self.plan.tag.clone();
        info!(
            "release {tag}: {} target(s), {} worker(s)",
            self.params.matrix.len(),
            self.params.jobs
        );

        let run = self.build_and_package();
        let outcome = self.gate_and_publish(&run);
        ReleaseReport { tag, outcome, run }
    }

    fn build_and_package(&self) -> MatrixRun {
        let builder = Arc::clone(&self.builder);
        let plan = Arc::clone(&self.plan);
        let source_root = self.params.source_root.clone();
        let timeout = self.params.build_timeout;

        run_matrix(
            self.params.matrix.targets(),
            self.params.jobs,
            self.params.run_timeout,
            &self.cancel,
            move |target, progress, cancel| {
                progress.report(TargetState::Building);
                let result = builder.build(target, &source_root, timeout, cancel);
                let binary = match result.binary_path {
                    Some(binary) if result.is_success() => binary,
                    _ => {
                        return TargetState::BuildFailed {
                            detail: result
                                .error_detail
                                .unwrap_or_else(|| "build failed".to_owned()),
                        };
                    }
                };
                progress.report(TargetState::Built {
                    binary: binary.clone(),
                });
                if cancel.is_cancelled() {
                    return TargetState::Cancelled;
                }

                let Some(format) = target.archive_format() else {
                    return TargetState::PackageFailed {
                        detail: format!("target {target} has no archive format"),
                    };
                };
                progress.report(TargetState::Packaging);
                let extra_files: Vec<Utf8PathBuf> = plan
                    .extra_files
                    .iter()
                    .chain(target.extra_files())
                    .cloned()
                    .collect();
                match plan.packager.package(target, &binary, &extra_files, format) {
                    Ok(artefact) => TargetState::Packaged(artefact),
                    Err(e) => TargetState::PackageFailed {
                        detail: e.to_string(),
                    },
                }
            },
        )
    }

    fn gate_and_publish(&self, run: &MatrixRun) -> ReleaseOutcome {
        let artifacts: Vec<_> = run
            .statuses
            .iter()
            .filter_map(|s| match &s.state {
                TargetState::Packaged(artefact) => Some(artefact.clone()),
                _ => None,
            })
            .collect();

        if run.timed_out || artifacts.len() != run.statuses.len() {
            let mut failures = run.failures();
            if failures.is_empty() {
                // Timed out after every target finished packaging.
                failures = run
                    .statuses
                    .iter()
                    .map(|s| TargetFailure {
                        target: s.target.clone(),
                        stage: "cancelled",
                        detail: "run timeout reached".to_owned(),
                    })
                    .collect();
            }
            warn!(
                "release {} aborted: {} target(s) did not package",
                self.plan.tag,
                failures.len()
            );
            return ReleaseOutcome::ReleaseAborted { failures };
        }

        let notes = match self.notes.generate(&self.plan.tag) {
            Ok(notes) => notes,
            Err(e) => {
                error!("release notes failed: {e}");
                return ReleaseOutcome::PublishFailed {
                    reason: e.to_string(),
                };
            }
        };

        let bundle = ReleaseBundle::new(self.plan.tag.clone(), notes, artifacts);
        match self.publisher.publish(&bundle) {
            Ok(receipt) => {
                info!("release {} published to {}", self.plan.tag, receipt.location);
                ReleaseOutcome::Published(receipt)
            }
            Err(e) => {
                error!("publishing {} failed: {e}", self.plan.tag);
                ReleaseOutcome::PublishFailed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "release_tests.rs"]
mod tests;
