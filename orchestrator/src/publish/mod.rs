//! Release publication.
//!
//! A [`Publisher`] receives a complete [`ReleaseBundle`] and makes it
//! available as one versioned release. Every implementation starts with
//! [`ensure_bundle_complete`] and fails closed: nothing is published unless
//! every archive and checksum file is present and still matches.
//!
//! # Sub-modules
//!
//! - [`directory`] - Publishes into a local release directory.
//! - [`github`] - Publishes a GitHub release through the REST API.
//! - [`notes`] - Release notes generation.

pub mod directory;
pub mod github;
pub mod notes;

use crate::artefact::checksum::{ChecksumError, verify_checksum_file};
use crate::bundle::ReleaseBundle;
use camino::Utf8PathBuf;
use serde::Serialize;
use thiserror::Error;

pub use directory::DirectoryPublisher;
pub use github::GitHubPublisher;
pub use notes::{GitHubNotes, NotesGenerator, StaticNotes};

/// Confirmation of a completed publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReceipt {
    /// Where the release can be found: a directory or a URL.
    pub location: String,
    /// Number of files published.
    pub assets: usize,
}

/// Errors raised while publishing a release.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The bundle has no artefacts.
    #[error("release bundle contains no artefacts")]
    EmptyBundle,

    /// An archive or checksum file named in the bundle is absent.
    #[error("missing artefact {path}")]
    MissingArtifact {
        /// The absent file.
        path: Utf8PathBuf,
    },

    /// An archive no longer matches its checksum file.
    #[error("artefact {path} failed checksum verification: {source}")]
    ChecksumMismatch {
        /// The archive that failed.
        path: Utf8PathBuf,
        /// The verification error.
        #[source]
        source: ChecksumError,
    },

    /// The release already exists at the destination.
    #[error("release {tag} already exists at {location}")]
    AlreadyPublished {
        /// The release tag.
        tag: String,
        /// Where the existing release was found.
        location: String,
    },

    /// A filesystem operation failed.
    #[error("publish I/O failed for {path}: {source}")]
    Io {
        /// Path being read or written.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A request to the release host failed.
    #[error("request to {url} failed: {reason}")]
    Http {
        /// The request URL.
        url: String,
        /// Description of the failure.
        reason: String,
    },

    /// The release host returned a response without a required field.
    #[error("unexpected response from {url}: {reason}")]
    UnexpectedResponse {
        /// The request URL.
        url: String,
        /// What was missing or malformed.
        reason: String,
    },

    /// The release record could not be serialised.
    #[error("failed to serialise release record: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Release notes could not be produced.
    #[error("release notes unavailable: {reason}")]
    Notes {
        /// Description of the failure.
        reason: String,
    },
}

impl PublishError {
    pub(crate) fn io(path: impl Into<Utf8PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// Publishes a release bundle.
#[cfg_attr(test, mockall::automock)]
pub trait Publisher {
    /// Publish `bundle` as one release.
    ///
    /// # Errors
    ///
    /// Returns a [`PublishError`] if the bundle is incomplete or the sink
    /// rejects it. A failed publication never leaves a public partial
    /// release.
    fn publish(&self, bundle: &ReleaseBundle) -> Result<PublishReceipt, PublishError>;
}

/// Check that every file in `bundle` exists and matches its checksum.
///
/// # Errors
///
/// Returns [`PublishError::EmptyBundle`] for a bundle without artefacts,
/// [`PublishError::MissingArtifact`] for an absent archive or checksum file
/// and [`PublishError::ChecksumMismatch`] when verification fails.
pub fn ensure_bundle_complete(bundle: &ReleaseBundle) -> Result<(), PublishError> {
    if bundle.artifacts().is_empty() {
        return Err(PublishError::EmptyBundle);
    }
    for artefact in bundle.artifacts() {
        for path in [&artefact.archive_path, &artefact.checksum_path] {
            if !path.is_file() {
                return Err(PublishError::MissingArtifact { path: path.clone() });
            }
        }
        let digest = verify_checksum_file(&artefact.archive_path, &artefact.checksum_path)
            .map_err(|source| PublishError::ChecksumMismatch {
                path: artefact.archive_path.clone(),
                source,
            })?;
        if digest != artefact.digest {
            return Err(PublishError::ChecksumMismatch {
                path: artefact.archive_path.clone(),
                source: ChecksumError::Mismatch {
                    archive: artefact.archive_path.clone(),
                    expected: artefact.digest.clone(),
                    actual: digest,
                },
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artefact::Packager;
    use rstest::rstest;
    use shipwright_common::{ArchiveFormat, ReleaseTag, TargetSpec, TargetTriple};
    use std::fs;
    use tempfile::TempDir;

    fn bundle(dir: &TempDir) -> ReleaseBundle {
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8");
        let binary = root.join("rask");
        fs::write(&binary, b"binary").expect("write");
        let tag = ReleaseTag::parse("v1.0.0", "v").expect("tag");
        let target = TargetSpec::new(
            "Linux",
            TargetTriple::try_from("x86_64-unknown-linux-gnu").expect("triple"),
            Some(ArchiveFormat::TarGz),
        );
        let artefact = Packager::new(root.join("dist"), "rask", tag.clone())
            .package(&target, &binary, &[], ArchiveFormat::TarGz)
            .expect("packaged");
        ReleaseBundle::new(tag, "notes".to_owned(), vec![artefact])
    }

    #[rstest]
    fn complete_bundle_passes() {
        let dir = TempDir::new().expect("temp dir");
        ensure_bundle_complete(&bundle(&dir)).expect("complete");
    }

    #[rstest]
    fn missing_checksum_file_fails_closed() {
        let dir = TempDir::new().expect("temp dir");
        let bundle = bundle(&dir);
        fs::remove_file(&bundle.artifacts()[0].checksum_path).expect("remove");

        let err = ensure_bundle_complete(&bundle).expect_err("incomplete");
        assert!(matches!(err, PublishError::MissingArtifact { .. }));
    }

    #[rstest]
    fn altered_archive_fails_closed() {
        let dir = TempDir::new().expect("temp dir");
        let bundle = bundle(&dir);
        fs::write(&bundle.artifacts()[0].archive_path, b"corrupted").expect("overwrite");

        let err = ensure_bundle_complete(&bundle).expect_err("mismatch");
        assert!(matches!(err, PublishError::ChecksumMismatch { .. }));
    }

    #[test]
    fn empty_bundle_is_rejected() {
        let tag = ReleaseTag::parse("v1.0.0", "v").expect("tag");
        let bundle = ReleaseBundle::new(tag, String::new(), Vec::new());
        assert!(matches!(
            ensure_bundle_complete(&bundle),
            Err(PublishError::EmptyBundle)
        ));
    }
}
