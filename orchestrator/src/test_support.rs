//! Deterministic fakes for the toolchain and the release host.
//!
//! Available to this crate's own tests and, through the `test-support`
//! feature, to integration and behaviour suites.

use crate::builder::{BuildResult, BuildStep, CANCELLED_DETAIL, TIMEOUT_DETAIL};
use crate::bundle::ReleaseBundle;
use crate::pipeline::Cancellation;
use crate::publish::{PublishError, PublishReceipt, Publisher, ensure_bundle_complete};
use camino::{Utf8Path, Utf8PathBuf};
use shipwright_common::{ArchiveFormat, TargetMatrix, TargetSpec, TargetTriple};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Binary name used by [`ScriptedBuildStep`] unless overridden.
pub const FAKE_BINARY: &str = "app";

/// A [`BuildStep`] that writes placeholder binaries instead of compiling.
///
/// Individual triples can be scripted to fail with a diagnostic or to hang
/// until their timeout expires.
#[derive(Debug, Default)]
pub struct ScriptedBuildStep {
    out_dir: Utf8PathBuf,
    binary: String,
    failures: HashMap<String, String>,
    hangs: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBuildStep {
    /// Write fake binaries under `out_dir/<triple>/`.
    #[must_use]
    pub fn new(out_dir: impl AsRef<Path>) -> Self {
        let out_dir = out_dir.as_ref();
        Self {
            out_dir: Utf8PathBuf::from(out_dir.to_string_lossy().into_owned()),
            binary: FAKE_BINARY.to_owned(),
            ..Self::default()
        }
    }

    /// Name the produced binary `binary`.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Make `triple` fail with `diagnostic`.
    #[must_use]
    pub fn fail(mut self, triple: &str, diagnostic: &str) -> Self {
        self.failures.insert(triple.to_owned(), diagnostic.to_owned());
        self
    }

    /// Make `triple` run until its timeout expires or the run is cancelled.
    #[must_use]
    pub fn hang(mut self, triple: &str) -> Self {
        self.hangs.insert(triple.to_owned());
        self
    }

    /// Triples built so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl BuildStep for ScriptedBuildStep {
    fn build(
        &self,
        target: &TargetSpec,
        _source_root: &Utf8Path,
        timeout: Duration,
        cancel: &Cancellation,
    ) -> BuildResult {
        let triple = target.triple();
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(triple.to_string());

        if self.hangs.contains(triple.as_str()) {
            let deadline = Instant::now() + timeout;
            while Instant::now() < deadline {
                if cancel.is_cancelled() {
                    return BuildResult::failure(target, CANCELLED_DETAIL);
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            return BuildResult::failure(target, TIMEOUT_DETAIL);
        }
        if let Some(diagnostic) = self.failures.get(triple.as_str()) {
            return BuildResult::failure(target, diagnostic.as_str());
        }

        let dir = self.out_dir.join(triple.as_str());
        let binary = dir.join(format!("{}{}", self.binary, triple.executable_suffix()));
        let written = std::fs::create_dir_all(&dir)
            .and_then(|()| std::fs::write(&binary, format!("fake binary for {triple}\n")));
        match written {
            Ok(()) => BuildResult::success(target, binary),
            Err(e) => BuildResult::failure(target, format!("cannot write {binary}: {e}")),
        }
    }
}

/// A [`Publisher`] that records every bundle it receives.
///
/// Clones share their record, so a test can keep one handle while the
/// orchestrator owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    published: Arc<Mutex<Vec<ReleaseBundle>>>,
    failure: Option<String>,
}

impl RecordingPublisher {
    /// A publisher that accepts every complete bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A publisher that records the bundle, then fails with `reason`.
    #[must_use]
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Bundles passed to [`Publisher::publish`], in call order.
    #[must_use]
    pub fn published(&self) -> Vec<ReleaseBundle> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, bundle: &ReleaseBundle) -> Result<PublishReceipt, PublishError> {
        ensure_bundle_complete(bundle)?;
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(bundle.clone());

        match &self.failure {
            Some(reason) => Err(PublishError::Http {
                url: "recording://publisher".to_owned(),
                reason: reason.clone(),
            }),
            None => Ok(PublishReceipt {
                location: format!("recording://{}", bundle.tag()),
                assets: bundle.artifacts().len() * 2,
            }),
        }
    }
}

/// Build a matrix from `(display name, triple)` pairs, using the
/// conventional archive format for each triple.
///
/// # Panics
///
/// Panics if a triple is malformed or the pairs do not form a valid matrix.
#[must_use]
#[expect(clippy::expect_used, reason = "fixtures are built from literal triples")]
pub fn matrix_of(targets: &[(&str, &str)]) -> TargetMatrix {
    let specs = targets
        .iter()
        .map(|(name, triple)| {
            let triple = TargetTriple::try_from(*triple).expect("fixture triple is valid");
            let format = ArchiveFormat::conventional_for(&triple);
            TargetSpec::new(*name, triple, Some(format))
        })
        .collect();
    TargetMatrix::new(specs).expect("fixture matrix is valid")
}
