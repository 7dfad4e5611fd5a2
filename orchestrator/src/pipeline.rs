//! Fan-out/fan-in engine shared by the CI and release orchestrators.
//!
//! Targets are processed by a bounded pool of worker threads. Each target's
//! own pipeline is sequential; workers report state transitions over a
//! channel to the coordinating thread, which owns every [`TargetStatus`]
//! and is the single barrier deciding when the run is over.

use crate::artefact::PackagedArtifact;
use camino::Utf8PathBuf;
use log::{info, warn};
use shipwright_common::{TargetMatrix, TargetSpec};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long in-flight targets get to acknowledge cancellation.
pub const CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Run-wide cancellation flag shared with every build.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    /// Create an untripped flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the flag. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether the flag has been tripped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Where one target is in its pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetState {
    /// Not started yet.
    Pending,
    /// The toolchain is running.
    Building,
    /// The binary was produced.
    Built {
        /// Path of the binary.
        binary: Utf8PathBuf,
    },
    /// The build failed or timed out.
    BuildFailed {
        /// Toolchain diagnostic or `timeout`.
        detail: String,
    },
    /// The archive is being written.
    Packaging,
    /// The archive and checksum exist.
    Packaged(PackagedArtifact),
    /// Packaging failed.
    PackageFailed {
        /// Description of the packaging error.
        detail: String,
    },
    /// The run ended before this target finished.
    Cancelled,
}

impl TargetState {
    /// Short lowercase label used in logs and reports.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Building => "building",
            Self::Built { .. } => "built",
            Self::BuildFailed { .. } => "build_failed",
            Self::Packaging => "packaging",
            Self::Packaged(_) => "packaged",
            Self::PackageFailed { .. } => "package_failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Failure diagnostic, if this state is a failure.
    #[must_use]
    pub fn failure_detail(&self) -> Option<&str> {
        match self {
            Self::BuildFailed { detail } | Self::PackageFailed { detail } => Some(detail),
            Self::Cancelled => Some("cancelled"),
            _ => None,
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The coordinator's view of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetStatus {
    /// The target.
    pub target: TargetSpec,
    /// Latest reported state.
    pub state: TargetState,
    /// Whether the target's pipeline has returned.
    pub finished: bool,
}

/// Every target's final status, in matrix order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixRun {
    /// One status per target, in matrix order.
    pub statuses: Vec<TargetStatus>,
    /// Whether the run-level timeout fired.
    pub timed_out: bool,
}

impl MatrixRun {
    /// Every failed target with its diagnostic, in matrix order.
    #[must_use]
    pub fn failures(&self) -> Vec<TargetFailure> {
        self.statuses
            .iter()
            .filter_map(|s| {
                s.state.failure_detail().map(|detail| TargetFailure {
                    target: s.target.clone(),
                    stage: s.state.label(),
                    detail: detail.to_owned(),
                })
            })
            .collect()
    }
}

/// A target that did not complete, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFailure {
    /// The failed target.
    pub target: TargetSpec,
    /// Terminal state label, e.g. `build_failed`.
    pub stage: &'static str,
    /// Diagnostic text.
    pub detail: String,
}

/// Explicit parameters for one orchestrated run.
#[derive(Debug, Clone)]
pub struct RunParams {
    /// Targets to process.
    pub matrix: TargetMatrix,
    /// Source tree handed to the toolchain.
    pub source_root: Utf8PathBuf,
    /// Per-target build timeout.
    pub build_timeout: Duration,
    /// Optional limit for the whole run.
    pub run_timeout: Option<Duration>,
    /// Worker thread count.
    pub jobs: NonZeroUsize,
}

/// Default worker count: the machine's available parallelism.
#[must_use]
pub fn default_jobs() -> NonZeroUsize {
    std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

struct Update {
    index: usize,
    state: TargetState,
    finished: bool,
}

/// Handle a target pipeline uses to report intermediate states.
pub struct Progress {
    index: usize,
    tx: Sender<Update>,
}

impl Progress {
    /// Report that the target moved to `state`.
    pub fn report(&self, state: TargetState) {
        let _ = self.tx.send(Update {
            index: self.index,
            state,
            finished: false,
        });
    }
}

/// Run `job` for every target in `targets` on `jobs` worker threads.
///
/// `job` returns the target's terminal state. When `run_timeout` expires the
/// coordinator trips the cancellation flag, waits up to [`CANCEL_GRACE`]
/// for in-flight targets to stop, and marks every unfinished target
/// [`TargetState::Cancelled`]. Workers that never acknowledge are left
/// detached rather than joined.
pub fn run_matrix<F>(
    targets: &[TargetSpec],
    jobs: NonZeroUsize,
    run_timeout: Option<Duration>,
    cancel: &Cancellation,
    job: F,
) -> MatrixRun
where
    F: Fn(&TargetSpec, &Progress, &Cancellation) -> TargetState + Send + Sync + 'static,
{
    let mut statuses: Vec<TargetStatus> = targets
        .iter()
        .map(|target| TargetStatus {
            target: target.clone(),
            state: TargetState::Pending,
            finished: false,
        })
        .collect();

    let shared: Arc<[TargetSpec]> = targets.into();
    let job = Arc::new(job);
    let next = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel::<Update>();

    let workers = jobs.get().min(targets.len());
    for _ in 0..workers {
        let shared = Arc::clone(&shared);
        let job = Arc::clone(&job);
        let next = Arc::clone(&next);
        let cancel = cancel.clone();
        let tx = tx.clone();
        std::thread::spawn(move || {
            while !cancel.is_cancelled() {
                let index = next.fetch_add(1, Ordering::SeqCst);
                let Some(target) = shared.get(index) else {
                    break;
                };
                let progress = Progress {
                    index,
                    tx: tx.clone(),
                };
                let state = job(target, &progress, &cancel);
                let _ = tx.send(Update {
                    index,
                    state,
                    finished: true,
                });
            }
        });
    }
    drop(tx);

    let deadline = run_timeout.map(|t| Instant::now() + t);
    let mut remaining = targets.len();
    let mut timed_out = false;
    let mut grace_deadline: Option<Instant> = None;

    while remaining > 0 {
        let wait_until = grace_deadline.or(deadline);
        let received = match wait_until {
            Some(at) => rx.recv_timeout(at.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(update) => {
                if apply(&mut statuses, update) {
                    remaining -= 1;
                }
            }
            Err(RecvTimeoutError::Timeout) if grace_deadline.is_none() => {
                warn!("run timeout reached; cancelling {remaining} unfinished target(s)");
                timed_out = true;
                cancel.cancel();
                grace_deadline = Some(Instant::now() + CANCEL_GRACE);
            }
            Err(_) => break,
        }
    }

    for status in statuses.iter_mut().filter(|s| !s.finished) {
        status.state = TargetState::Cancelled;
        status.finished = true;
    }

    MatrixRun {
        statuses,
        timed_out,
    }
}

/// Record an update; returns whether it finished a target.
fn apply(statuses: &mut [TargetStatus], update: Update) -> bool {
    let Some(status) = statuses.get_mut(update.index) else {
        return false;
    };
    if status.finished {
        return false;
    }
    info!("{}: {}", status.target, update.state);
    status.state = update.state;
    status.finished = update.finished;
    update.finished
}
