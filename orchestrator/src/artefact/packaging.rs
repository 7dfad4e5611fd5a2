//! Release archive packaging.
//!
//! A [`Packager`] turns one target's built binary plus its auxiliary files
//! into a named archive and a sibling `sha256sum` checksum file. Inputs are
//! validated before anything is written, and the archive only appears under
//! its final name once it is complete.

use super::archive::{ArchiveEntry, EXECUTABLE_MODE, REGULAR_MODE, write_archive};
use super::checksum::{Sha256Digest, compute_sha256, write_checksum_file};
use super::naming::ArtefactName;
use super::packaging_error::PackagingError;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use serde::Serialize;
use shipwright_common::{ArchiveFormat, ReleaseTag, TargetSpec};
use std::collections::HashSet;
use std::fs;

/// Suffix of the in-progress archive before it is renamed into place.
const PARTIAL_SUFFIX: &str = ".partial";

/// A packaged target: archive, checksum file and digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackagedArtifact {
    /// The target the archive was built for.
    pub target: TargetSpec,
    /// Path of the archive.
    pub archive_path: Utf8PathBuf,
    /// Path of the `<archive>.sha256` file.
    pub checksum_path: Utf8PathBuf,
    /// SHA-256 digest of the archive.
    pub digest: Sha256Digest,
}

/// Packages built binaries for one release.
#[derive(Debug, Clone)]
pub struct Packager {
    output_dir: Utf8PathBuf,
    project: String,
    tag: ReleaseTag,
}

impl Packager {
    /// Create a packager writing into `output_dir`.
    #[must_use]
    pub fn new(output_dir: Utf8PathBuf, project: impl Into<String>, tag: ReleaseTag) -> Self {
        Self {
            output_dir,
            project: project.into(),
            tag,
        }
    }

    /// Package `binary` and `extra_files` for `target`.
    ///
    /// The binary is the first entry, followed by the extra files sorted by
    /// name. Rebuilding with identical inputs yields an identical archive.
    ///
    /// # Errors
    ///
    /// Returns [`PackagingError::MissingFile`] if the binary or any extra
    /// file is not a regular file, [`PackagingError::DuplicateEntry`] if two
    /// inputs share a file name, and I/O, zip or checksum errors otherwise.
    pub fn package(
        &self,
        target: &TargetSpec,
        binary: &Utf8Path,
        extra_files: &[Utf8PathBuf],
        format: ArchiveFormat,
    ) -> Result<PackagedArtifact, PackagingError> {
        let entries = plan_entries(binary, extra_files)?;

        fs::create_dir_all(&self.output_dir).map_err(PackagingError::io(&self.output_dir))?;
        let name = ArtefactName::new(self.project.as_str(), &self.tag, target, format);
        let archive_path = self.output_dir.join(name.filename());
        let partial_path = Utf8PathBuf::from(format!("{archive_path}{PARTIAL_SUFFIX}"));

        debug!("writing {} entries to {partial_path}", entries.len());
        if let Err(err) = write_archive(format, &partial_path, &entries) {
            let _ = fs::remove_file(&partial_path);
            return Err(err);
        }
        fs::rename(&partial_path, &archive_path).map_err(PackagingError::io(&archive_path))?;

        let digest = compute_sha256(&archive_path)?;
        let checksum_path = write_checksum_file(&archive_path, &digest)?;
        info!("packaged {target} as {archive_path} (sha256 {digest})");

        Ok(PackagedArtifact {
            target: target.clone(),
            archive_path,
            checksum_path,
            digest,
        })
    }
}

/// Validate inputs and lay out the archive entries.
fn plan_entries(
    binary: &Utf8Path,
    extra_files: &[Utf8PathBuf],
) -> Result<Vec<ArchiveEntry>, PackagingError> {
    require_regular_file(binary)?;
    for path in extra_files {
        require_regular_file(path)?;
    }

    let mut extras: Vec<ArchiveEntry> = extra_files
        .iter()
        .map(|p| ArchiveEntry::new(p.clone(), REGULAR_MODE))
        .collect();
    extras.sort_by(|a, b| a.name.cmp(&b.name));

    let mut entries = Vec::with_capacity(extras.len() + 1);
    entries.push(ArchiveEntry::new(binary.to_owned(), EXECUTABLE_MODE));
    entries.extend(extras);

    let mut names = HashSet::with_capacity(entries.len());
    for entry in &entries {
        if !names.insert(entry.name.as_str()) {
            return Err(PackagingError::DuplicateEntry {
                name: entry.name.clone(),
                path: entry.source.clone(),
            });
        }
    }
    Ok(entries)
}

fn require_regular_file(path: &Utf8Path) -> Result<(), PackagingError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(PackagingError::MissingFile {
            path: path.to_owned(),
        }),
    }
}

#[cfg(test)]
#[path = "packaging_tests.rs"]
mod tests;
