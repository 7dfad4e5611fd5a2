//! Deterministic `.tar.gz` and `.zip` writers.
//!
//! Entries are written flat, in the order given, with zeroed timestamps and
//! ownership so identical inputs always produce byte-identical archives.

use super::packaging_error::PackagingError;
use camino::{Utf8Path, Utf8PathBuf};
use flate2::{Compression, GzBuilder};
use shipwright_common::ArchiveFormat;
use std::fs;
use std::io::{self, Write};
use zip::write::SimpleFileOptions;

/// Mode for the packaged executable.
pub const EXECUTABLE_MODE: u32 = 0o755;

/// Mode for every auxiliary file.
pub const REGULAR_MODE: u32 = 0o644;

/// One file placed into an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// File on disk providing the contents.
    pub source: Utf8PathBuf,
    /// Name of the entry at the archive root.
    pub name: String,
    /// Unix permission bits recorded for the entry.
    pub mode: u32,
}

impl ArchiveEntry {
    /// Create an entry named after the source file.
    #[must_use]
    pub fn new(source: Utf8PathBuf, mode: u32) -> Self {
        let name = source.file_name().unwrap_or(source.as_str()).to_owned();
        Self { source, name, mode }
    }
}

/// Write `entries` into a new archive at `dest` in the given format.
///
/// # Errors
///
/// Returns [`PackagingError::Io`] if a source cannot be read or `dest`
/// cannot be written, and [`PackagingError::Zip`] for zip encoder failures.
pub fn write_archive(
    format: ArchiveFormat,
    dest: &Utf8Path,
    entries: &[ArchiveEntry],
) -> Result<(), PackagingError> {
    let file = fs::File::create(dest).map_err(PackagingError::io(dest))?;
    match format {
        ArchiveFormat::TarGz => write_tar_gz(file, dest, entries),
        ArchiveFormat::Zip => write_zip(file, dest, entries),
    }
}

fn write_tar_gz(
    file: fs::File,
    dest: &Utf8Path,
    entries: &[ArchiveEntry],
) -> Result<(), PackagingError> {
    let encoder = GzBuilder::new().mtime(0).write(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for entry in entries {
        let source = fs::File::open(&entry.source).map_err(PackagingError::io(&entry.source))?;
        let size = source
            .metadata()
            .map_err(PackagingError::io(&entry.source))?
            .len();

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(size);
        header.set_mode(entry.mode);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        builder
            .append_data(&mut header, &entry.name, source)
            .map_err(PackagingError::io(&entry.source))?;
    }

    let encoder = builder.into_inner().map_err(PackagingError::io(dest))?;
    let file = encoder.finish().map_err(PackagingError::io(dest))?;
    file.sync_all().map_err(PackagingError::io(dest))
}

fn write_zip(
    file: fs::File,
    dest: &Utf8Path,
    entries: &[ArchiveEntry],
) -> Result<(), PackagingError> {
    let zip_err = |source| PackagingError::Zip {
        path: dest.to_owned(),
        source,
    };
    let mut zip = zip::ZipWriter::new(file);

    for entry in entries {
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(entry.mode);
        zip.start_file(entry.name.as_str(), options).map_err(zip_err)?;
        let mut source =
            fs::File::open(&entry.source).map_err(PackagingError::io(&entry.source))?;
        io::copy(&mut source, &mut zip).map_err(PackagingError::io(&entry.source))?;
    }

    let mut file = zip.finish().map_err(zip_err)?;
    file.flush().map_err(PackagingError::io(dest))?;
    file.sync_all().map_err(PackagingError::io(dest))
}
