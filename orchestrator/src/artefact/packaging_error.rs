//! Error types for release archive packaging.
//!
//! Every variant is fatal for the target being packaged and is never
//! retried.

use super::checksum::ChecksumError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors arising while packaging one target's release archive.
#[derive(Debug, Error)]
pub enum PackagingError {
    /// A file that should go into the archive is absent or not a regular file.
    #[error("missing file for packaging: {path}")]
    MissingFile {
        /// Path of the missing file.
        path: Utf8PathBuf,
    },

    /// Two inputs would occupy the same name inside the archive.
    #[error("duplicate archive entry \"{name}\" from {path}")]
    DuplicateEntry {
        /// Entry name inside the archive.
        name: String,
        /// Source path of the second occurrence.
        path: Utf8PathBuf,
    },

    /// A target without an archive format reached the packager.
    #[error("target {target} has no archive format")]
    NoArchiveFormat {
        /// Display name of the target.
        target: String,
    },

    /// An I/O operation failed while writing the archive.
    #[error("I/O error while packaging {path}: {source}")]
    Io {
        /// Path being read or written.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The zip writer failed.
    #[error("zip archive error for {path}: {source}")]
    Zip {
        /// Archive being written.
        path: Utf8PathBuf,
        /// The underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },

    /// The checksum could not be computed or written.
    #[error(transparent)]
    Checksum(#[from] ChecksumError),
}

impl PackagingError {
    /// Wrap an I/O error with the path it concerns.
    pub(crate) fn io(path: impl Into<Utf8PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_names_the_path() {
        let err = PackagingError::MissingFile {
            path: Utf8PathBuf::from("/work/LICENSE"),
        };
        assert_eq!(err.to_string(), "missing file for packaging: /work/LICENSE");
    }

    #[test]
    fn io_helper_preserves_path_and_source() {
        let err = PackagingError::io("/dist/a.zip")(std::io::Error::other("disk full"));
        assert!(err.to_string().contains("/dist/a.zip"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
