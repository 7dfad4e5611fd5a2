//! Error types for the `shipwright` CLI.
//!
//! Per-target failures never surface here: they are recorded in the run
//! report. A [`CliError`] stops the command before or after orchestration and
//! maps to a process exit code.

use crate::artefact::checksum::ChecksumError;
use camino::Utf8PathBuf;
use shipwright_common::ConfigError;
use thiserror::Error;

/// Exit code for a failed CI run, aborted release or failed publication.
pub const EXIT_FAILURE: i32 = 1;

/// Exit code for configuration and usage errors.
pub const EXIT_CONFIG: i32 = 2;

/// Errors that stop a `shipwright` command.
#[derive(Debug, Error)]
pub enum CliError {
    /// The configuration could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A required environment variable is not set.
    #[error("{name} must be set to publish to {sink}")]
    MissingEnv {
        /// The variable name.
        name: &'static str,
        /// The sink that needs it.
        sink: &'static str,
    },

    /// A path given on the command line is not valid UTF-8.
    #[error("path is not valid UTF-8: {path}")]
    NonUtf8Path {
        /// Lossy rendering of the path.
        path: String,
    },

    /// Archive verification failed.
    #[error(transparent)]
    Checksum(#[from] ChecksumError),

    /// A report could not be serialised.
    #[error("failed to render report: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing output failed.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },

    /// The working directory could not be determined.
    #[error("cannot determine working directory {path}: {source}")]
    WorkingDirectory {
        /// The directory that could not be resolved.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    /// Process exit code for this error.
    ///
    /// Configuration problems exit with [`EXIT_CONFIG`]; everything else,
    /// including a failed verification, exits with [`EXIT_FAILURE`].
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::MissingEnv { .. } | Self::NonUtf8Path { .. } => EXIT_CONFIG,
            Self::Checksum(_)
            | Self::Serialization(_)
            | Self::WriteFailed { .. }
            | Self::WorkingDirectory { .. } => EXIT_FAILURE,
        }
    }
}

/// Result type alias using [`CliError`].
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artefact::Sha256Digest;
    use rstest::rstest;

    #[rstest]
    #[case::config(
        CliError::Config(ConfigError::EmptyMatrix),
        EXIT_CONFIG
    )]
    #[case::missing_env(
        CliError::MissingEnv { name: "GITHUB_TOKEN", sink: "github" },
        EXIT_CONFIG
    )]
    #[case::write(
        CliError::WriteFailed { source: std::io::Error::other("broken pipe") },
        EXIT_FAILURE
    )]
    fn errors_map_to_exit_codes(#[case] err: CliError, #[case] expected: i32) {
        assert_eq!(err.exit_code(), expected);
    }

    #[test]
    fn checksum_mismatch_is_a_failure_not_a_usage_error() {
        let digest = |c: char| Sha256Digest::try_from(c.to_string().repeat(64)).expect("digest");
        let err = CliError::from(ChecksumError::Mismatch {
            archive: Utf8PathBuf::from("dist/rask.tar.gz"),
            expected: digest('a'),
            actual: digest('b'),
        });
        assert_eq!(err.exit_code(), EXIT_FAILURE);
        assert!(err.to_string().contains("dist/rask.tar.gz"));
    }

    #[test]
    fn missing_env_names_the_variable() {
        let err = CliError::MissingEnv {
            name: "GITHUB_TOKEN",
            sink: "github",
        };
        assert_eq!(err.to_string(), "GITHUB_TOKEN must be set to publish to github");
    }
}
