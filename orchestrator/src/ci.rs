//! The CI check: build every target, publish nothing.

use crate::builder::BuildStep;
use crate::pipeline::{
    Cancellation, MatrixRun, RunParams, TargetFailure, TargetState, run_matrix,
};
use log::info;
use std::sync::Arc;

/// Result of a CI run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CiOutcome {
    /// Every target built.
    AllPassed,
    /// At least one target failed or was cancelled.
    SomeFailed {
        /// Each failing target with its diagnostic.
        failures: Vec<TargetFailure>,
    },
}

/// Outcome plus the per-target statuses it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiReport {
    /// The run outcome.
    pub outcome: CiOutcome,
    /// Final status of every target.
    pub run: MatrixRun,
}

impl CiReport {
    /// Whether every target built.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcome == CiOutcome::AllPassed
    }
}

/// Builds the whole matrix concurrently.
pub struct CiOrchestrator {
    params: RunParams,
    builder: Arc<dyn BuildStep>,
    cancel: Cancellation,
}

impl CiOrchestrator {
    /// Create an orchestrator for `params` using `builder`.
    #[must_use]
    pub fn new(params: RunParams, builder: Arc<dyn BuildStep>) -> Self {
        Self {
            params,
            builder,
            cancel: Cancellation::new(),
        }
    }

    /// Flag that stops the run when tripped.
    #[must_use]
    pub fn cancellation(&self) -> Cancellation {
        self.cancel.clone()
    }

    /// Build every target and report the outcome.
    #[must_use]
    pub fn run(&self) -> CiReport {
        info!(
            "CI run: {} target(s), {} worker(s)",
            self.params.matrix.len(),
            self.params.jobs
        );

        let builder = Arc::clone(&self.builder);
        let source_root = self.params.source_root.clone();
        let timeout = self.params.build_timeout;
        let run = run_matrix(
            self.params.matrix.targets(),
            self.params.jobs,
            self.params.run_timeout,
            &self.cancel,
            move |target, progress, cancel| {
                progress.report(TargetState::Building);
                let result = builder.build(target, &source_root, timeout, cancel);
                match result.binary_path {
                    Some(binary) if result.is_success() => TargetState::Built { binary },
                    _ => TargetState::BuildFailed {
                        detail: result
                            .error_detail
                            .unwrap_or_else(|| "build failed".to_owned()),
                    },
                }
            },
        );

        let failures = run.failures();
        let outcome = if failures.is_empty() {
            CiOutcome::AllPassed
        } else {
            CiOutcome::SomeFailed { failures }
        };
        CiReport { outcome, run }
    }
}
