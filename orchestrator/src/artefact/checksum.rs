//! SHA-256 digests and `sha256sum`-style checksum files.
//!
//! A checksum file sits next to its archive as `<archive>.sha256` and holds a
//! single line, `<64 lowercase hex>  <archive file name>\n`, so
//! `sha256sum -c` can verify it directly.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::Read;
use thiserror::Error;

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Extension appended to an archive path to name its checksum file.
pub const CHECKSUM_EXTENSION: &str = "sha256";

/// Errors raised while computing, writing or verifying checksums.
#[derive(Debug, Error)]
pub enum ChecksumError {
    /// A digest string is not 64 lowercase hex characters.
    #[error("invalid SHA-256 digest: {reason}")]
    InvalidDigest {
        /// Description of the validation failure.
        reason: String,
    },

    /// A file could not be read or written.
    #[error("checksum I/O failed for {path}")]
    Io {
        /// Path being read or written.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A checksum file does not follow the `sha256sum` line format.
    #[error("malformed checksum file {path}: {reason}")]
    Malformed {
        /// Path of the checksum file.
        path: Utf8PathBuf,
        /// Description of the problem.
        reason: String,
    },

    /// The checksum file names a different archive.
    #[error("checksum file {path} names {recorded}, not {expected}")]
    NameMismatch {
        /// Path of the checksum file.
        path: Utf8PathBuf,
        /// File name recorded in the checksum file.
        recorded: String,
        /// File name of the archive being verified.
        expected: String,
    },

    /// The archive no longer matches its recorded digest.
    #[error("checksum mismatch for {archive}: recorded {expected}, computed {actual}")]
    Mismatch {
        /// Path of the archive.
        archive: Utf8PathBuf,
        /// Digest recorded in the checksum file.
        expected: Sha256Digest,
        /// Digest computed from the archive.
        actual: Sha256Digest,
    },
}

/// A validated, lowercase hex-encoded SHA-256 digest.
///
/// # Examples
///
/// ```
/// use shipwright_orchestrator::artefact::checksum::Sha256Digest;
///
/// let hex = "a".repeat(64);
/// let digest: Sha256Digest = hex.as_str().try_into().expect("valid digest");
/// assert_eq!(digest.as_str().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Return the digest as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Sha256Digest {
    type Error = ChecksumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        validate_sha256(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for Sha256Digest {
    type Error = ChecksumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_sha256(&value)?;
        Ok(Self(value))
    }
}

impl AsRef<str> for Sha256Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_sha256(value: &str) -> Result<(), ChecksumError> {
    if value.len() != DIGEST_HEX_LEN {
        return Err(ChecksumError::InvalidDigest {
            reason: format!(
                "expected {DIGEST_HEX_LEN} hex characters, got {}",
                value.len()
            ),
        });
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !c.is_ascii_digit() && !('a'..='f').contains(c))
    {
        return Err(ChecksumError::InvalidDigest {
            reason: format!("'{bad}' is not a lowercase hex digit"),
        });
    }
    Ok(())
}

/// Compute the SHA-256 digest of the file at `path`.
///
/// # Errors
///
/// Returns [`ChecksumError::Io`] if the file cannot be read.
pub fn compute_sha256(path: &Utf8Path) -> Result<Sha256Digest, ChecksumError> {
    let io_err = |source| ChecksumError::Io {
        path: path.to_owned(),
        source,
    };
    let mut file = fs::File::open(path).map_err(io_err)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer).map_err(io_err)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    // `{:x}` on the finalised hash is always 64 lowercase hex characters.
    Ok(Sha256Digest(format!("{:x}", hasher.finalize())))
}

/// Path of the checksum file that accompanies `archive`.
#[must_use]
pub fn checksum_path_for(archive: &Utf8Path) -> Utf8PathBuf {
    let mut path = archive.as_str().to_owned();
    path.push('.');
    path.push_str(CHECKSUM_EXTENSION);
    Utf8PathBuf::from(path)
}

/// Render the single `sha256sum` line for `file_name`.
#[must_use]
pub fn checksum_line(digest: &Sha256Digest, file_name: &str) -> String {
    format!("{digest}  {file_name}\n")
}

/// Write `<archive>.sha256` for an archive whose digest is already known.
///
/// # Errors
///
/// Returns [`ChecksumError::Io`] if the file cannot be written, or
/// [`ChecksumError::Malformed`] if `archive` has no file name.
pub fn write_checksum_file(
    archive: &Utf8Path,
    digest: &Sha256Digest,
) -> Result<Utf8PathBuf, ChecksumError> {
    let file_name = archive.file_name().ok_or_else(|| ChecksumError::Malformed {
        path: archive.to_owned(),
        reason: "archive path has no file name".to_owned(),
    })?;
    let path = checksum_path_for(archive);
    fs::write(&path, checksum_line(digest, file_name)).map_err(|source| ChecksumError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Parse a checksum file into its digest and recorded file name.
///
/// Both the text (`<hex>  <name>`) and binary (`<hex> *<name>`) markers of
/// `sha256sum` are accepted.
///
/// # Errors
///
/// Returns [`ChecksumError::Io`] if the file cannot be read and
/// [`ChecksumError::Malformed`] if it does not hold one valid line.
pub fn read_checksum_file(path: &Utf8Path) -> Result<(Sha256Digest, String), ChecksumError> {
    let contents = fs::read_to_string(path).map_err(|source| ChecksumError::Io {
        path: path.to_owned(),
        source,
    })?;
    let malformed = |reason: &str| ChecksumError::Malformed {
        path: path.to_owned(),
        reason: reason.to_owned(),
    };

    let mut lines = contents.lines().filter(|l| !l.trim().is_empty());
    let line = lines.next().ok_or_else(|| malformed("file is empty"))?;
    if lines.next().is_some() {
        return Err(malformed("expected exactly one checksum line"));
    }

    let (hex, rest) = line
        .split_once(' ')
        .ok_or_else(|| malformed("missing separator between digest and file name"))?;
    let name = rest
        .strip_prefix(' ')
        .or_else(|| rest.strip_prefix('*'))
        .ok_or_else(|| malformed("separator must be two spaces or ' *'"))?;
    if name.is_empty() {
        return Err(malformed("missing file name"));
    }
    let digest = Sha256Digest::try_from(hex).map_err(|e| malformed(&e.to_string()))?;
    Ok((digest, name.to_owned()))
}

/// Verify `archive` against the checksum file at `checksum`.
///
/// Returns the recomputed digest on success.
///
/// # Errors
///
/// Returns [`ChecksumError::NameMismatch`] if the checksum file names a
/// different file, [`ChecksumError::Mismatch`] if the digests differ, and
/// read or parse errors otherwise.
pub fn verify_checksum_file(
    archive: &Utf8Path,
    checksum: &Utf8Path,
) -> Result<Sha256Digest, ChecksumError> {
    let (expected, recorded) = read_checksum_file(checksum)?;
    let archive_name = archive.file_name().unwrap_or_default();
    if recorded != archive_name {
        return Err(ChecksumError::NameMismatch {
            path: checksum.to_owned(),
            recorded,
            expected: archive_name.to_owned(),
        });
    }

    let actual = compute_sha256(archive)?;
    if actual == expected {
        Ok(actual)
    } else {
        Err(ChecksumError::Mismatch {
            archive: archive.to_owned(),
            expected,
            actual,
        })
    }
}
