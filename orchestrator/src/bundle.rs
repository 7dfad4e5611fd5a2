//! The immutable set of artefacts published as one release.

use crate::artefact::PackagedArtifact;
use serde::Serialize;
use shipwright_common::ReleaseTag;

/// A release ready for publication: tag, notes and one artefact per target.
///
/// Assembled once by the release orchestrator and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseBundle {
    tag: ReleaseTag,
    notes: String,
    artifacts: Vec<PackagedArtifact>,
}

impl ReleaseBundle {
    /// Assemble a bundle.
    #[must_use]
    pub fn new(tag: ReleaseTag, notes: String, artifacts: Vec<PackagedArtifact>) -> Self {
        Self {
            tag,
            notes,
            artifacts,
        }
    }

    /// The release tag.
    #[must_use]
    pub fn tag(&self) -> &ReleaseTag {
        &self.tag
    }

    /// Release notes.
    #[must_use]
    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// Packaged artefacts, in matrix order.
    #[must_use]
    pub fn artifacts(&self) -> &[PackagedArtifact] {
        &self.artifacts
    }
}
