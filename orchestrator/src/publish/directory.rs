//! Publication into a local release directory.
//!
//! Each release becomes `<root>/<tag>/` holding every archive, every
//! checksum file and a `release.json` record. The directory is assembled
//! under a hidden staging name and renamed into place, so a release is
//! either entirely present or absent.

use super::{PublishError, PublishReceipt, Publisher, ensure_bundle_complete};
use crate::artefact::Sha256Digest;
use crate::bundle::ReleaseBundle;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use serde::Serialize;
use std::fs;

/// File name of the release record.
pub const RELEASE_RECORD: &str = "release.json";

/// Publishes releases as sub-directories of a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryPublisher {
    root: Utf8PathBuf,
}

#[derive(Serialize)]
struct ReleaseRecord<'a> {
    tag: &'a str,
    notes: &'a str,
    artifacts: Vec<RecordEntry<'a>>,
}

#[derive(Serialize)]
struct RecordEntry<'a> {
    target: &'a str,
    triple: &'a str,
    archive: &'a str,
    checksum_file: &'a str,
    sha256: &'a Sha256Digest,
}

impl DirectoryPublisher {
    /// Create a publisher writing releases under `root`.
    #[must_use]
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    /// Directory a release with `tag` is published to.
    #[must_use]
    pub fn release_dir(&self, tag: &str) -> Utf8PathBuf {
        self.root.join(tag)
    }

    fn stage(&self, bundle: &ReleaseBundle, staging: &Utf8Path) -> Result<usize, PublishError> {
        let mut entries = Vec::with_capacity(bundle.artifacts().len());
        let mut copied = 0;
        for artefact in bundle.artifacts() {
            let archive = copy_into(&artefact.archive_path, staging)?;
            let checksum = copy_into(&artefact.checksum_path, staging)?;
            copied += 2;
            entries.push(RecordEntry {
                target: artefact.target.display_name(),
                triple: artefact.target.triple().as_str(),
                archive,
                checksum_file: checksum,
                sha256: &artefact.digest,
            });
        }

        let record = ReleaseRecord {
            tag: bundle.tag().as_str(),
            notes: bundle.notes(),
            artifacts: entries,
        };
        let record_path = staging.join(RELEASE_RECORD);
        let json = serde_json::to_string_pretty(&record)?;
        fs::write(&record_path, json).map_err(PublishError::io(&record_path))?;
        Ok(copied)
    }
}

impl Publisher for DirectoryPublisher {
    fn publish(&self, bundle: &ReleaseBundle) -> Result<PublishReceipt, PublishError> {
        ensure_bundle_complete(bundle)?;

        let tag = bundle.tag().as_str();
        let target = self.release_dir(tag);
        if target.exists() {
            return Err(PublishError::AlreadyPublished {
                tag: tag.to_owned(),
                location: target.to_string(),
            });
        }

        fs::create_dir_all(&self.root).map_err(PublishError::io(&self.root))?;
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{tag}."))
            .suffix(".staging")
            .tempdir_in(&self.root)
            .map_err(PublishError::io(&self.root))?;
        let staging_path = Utf8Path::from_path(staging.path())
            .ok_or_else(|| PublishError::Io {
                path: self.root.clone(),
                source: std::io::Error::other("staging path is not valid UTF-8"),
            })?
            .to_owned();

        debug!("staging release {tag} in {staging_path}");
        let copied = self.stage(bundle, &staging_path)?;

        if target.exists() {
            return Err(PublishError::AlreadyPublished {
                tag: tag.to_owned(),
                location: target.to_string(),
            });
        }
        fs::rename(&staging_path, &target).map_err(PublishError::io(&target))?;
        info!("published release {tag} to {target}");

        Ok(PublishReceipt {
            location: target.to_string(),
            assets: copied,
        })
    }
}

/// Copy `source` into `dir`, returning the file name.
fn copy_into<'a>(source: &'a Utf8Path, dir: &Utf8Path) -> Result<&'a str, PublishError> {
    let name = source.file_name().ok_or_else(|| PublishError::MissingArtifact {
        path: source.to_owned(),
    })?;
    let dest = dir.join(name);
    fs::copy(source, &dest).map_err(PublishError::io(&dest))?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artefact::Packager;
    use rstest::{fixture, rstest};
    use shipwright_common::{ArchiveFormat, ReleaseTag, TargetSpec, TargetTriple};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        root: Utf8PathBuf,
        bundle: ReleaseBundle,
    }

    #[fixture]
    fn fixture() -> Fixture {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8");
        let binary = root.join("rask");
        fs::write(&binary, b"binary").expect("write");
        let tag = ReleaseTag::parse("v1.0.0", "v").expect("tag");
        let packager = Packager::new(root.join("dist"), "rask", tag.clone());

        let artifacts = [
            ("Linux", "x86_64-unknown-linux-gnu", ArchiveFormat::TarGz),
            ("Windows", "x86_64-pc-windows-msvc", ArchiveFormat::Zip),
        ]
        .into_iter()
        .map(|(name, triple, format)| {
            let target = TargetSpec::new(
                name,
                TargetTriple::try_from(triple).expect("triple"),
                Some(format),
            );
            packager
                .package(&target, &binary, &[], format)
                .expect("packaged")
        })
        .collect();

        Fixture {
            _dir: dir,
            bundle: ReleaseBundle::new(tag, "First release.".to_owned(), artifacts),
            root,
        }
    }

    #[rstest]
    fn publishes_every_file_and_a_record(fixture: Fixture) {
        let publisher = DirectoryPublisher::new(fixture.root.join("releases"));

        let receipt = publisher.publish(&fixture.bundle).expect("published");
        assert_eq!(receipt.assets, 4);

        let release = fixture.root.join("releases/v1.0.0");
        assert_eq!(receipt.location, release.as_str());
        assert!(release.join("rask-v1.0.0-linux.tar.gz").is_file());
        assert!(release.join("rask-v1.0.0-windows.zip.sha256").is_file());

        let record: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(release.join(RELEASE_RECORD)).expect("read record"),
        )
        .expect("valid json");
        assert_eq!(record["tag"], "v1.0.0");
        assert_eq!(record["notes"], "First release.");
        assert_eq!(record["artifacts"].as_array().map(Vec::len), Some(2));
        assert_eq!(
            record["artifacts"][0]["sha256"],
            fixture.bundle.artifacts()[0].digest.as_str()
        );
    }

    #[rstest]
    fn refuses_to_overwrite_an_existing_release(fixture: Fixture) {
        let publisher = DirectoryPublisher::new(fixture.root.join("releases"));
        publisher.publish(&fixture.bundle).expect("first publish");

        let err = publisher.publish(&fixture.bundle).expect_err("second publish");
        assert!(matches!(err, PublishError::AlreadyPublished { .. }));
    }

    #[rstest]
    fn incomplete_bundle_publishes_nothing(fixture: Fixture) {
        fs::remove_file(&fixture.bundle.artifacts()[1].archive_path).expect("remove");
        let releases = fixture.root.join("releases");
        let publisher = DirectoryPublisher::new(releases.clone());

        let err = publisher.publish(&fixture.bundle).expect_err("incomplete");
        assert!(matches!(err, PublishError::MissingArtifact { .. }));
        assert!(!releases.exists());
    }
}
