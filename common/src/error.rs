//! Configuration error types.
//!
//! Every failure that can happen before the first build starts is a
//! [`ConfigError`]: unreadable or malformed configuration files, an invalid
//! target matrix, or a release tag that does not parse.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("configuration not found at {path}")]
    NotFound {
        /// Path that was resolved and checked.
        path: Utf8PathBuf,
    },

    /// The configuration file could not be read.
    #[error("failed to read {path}")]
    Read {
        /// Path of the unreadable file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or does not match the schema.
    #[error("invalid configuration in {path}: {reason}")]
    Parse {
        /// Path of the malformed file.
        path: Utf8PathBuf,
        /// Description of the parse error.
        reason: String,
    },

    /// The target matrix has no entries.
    #[error("target matrix is empty; declare at least one [[targets]] entry")]
    EmptyMatrix,

    /// A target triple is declared more than once.
    #[error("target triple {triple} is declared more than once")]
    DuplicateTriple {
        /// The repeated triple.
        triple: String,
    },

    /// Two display names produce the same archive name component.
    #[error("targets \"{first}\" and \"{second}\" would produce the same archive name")]
    DuplicateDisplayName {
        /// Display name of the earlier target.
        first: String,
        /// Display name of the later, conflicting target.
        second: String,
    },

    /// A target triple is syntactically invalid.
    #[error("malformed target triple \"{triple}\": {reason}")]
    MalformedTriple {
        /// The rejected triple.
        triple: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// A target has a display name with nothing usable in an archive name.
    #[error("target {triple} has an empty display name")]
    EmptyDisplayName {
        /// Triple of the offending target.
        triple: String,
    },

    /// An archive format string is not recognised.
    #[error("unknown archive format \"{value}\"; expected \"zip\" or \"tar.gz\"")]
    UnknownArchiveFormat {
        /// The rejected format string.
        value: String,
    },

    /// A release run needs an archive format for every target.
    #[error("target \"{target}\" has no archive format; release targets require one")]
    MissingArchiveFormat {
        /// Display name of the target.
        target: String,
    },

    /// A release tag does not match the version pattern.
    #[error("invalid release tag \"{tag}\": {reason}")]
    InvalidTag {
        /// The rejected tag.
        tag: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// A timeout or job count is zero.
    #[error("{field} must be greater than zero")]
    ZeroValue {
        /// Name of the offending setting.
        field: &'static str,
    },

    /// The publish section is missing a setting the chosen sink needs.
    #[error("publish sink \"{sink}\" requires `{field}` in [publish]")]
    MissingPublishSetting {
        /// Name of the sink.
        sink: &'static str,
        /// Name of the missing setting.
        field: &'static str,
    },

    /// The publish sink name is not recognised.
    #[error("unknown publish sink \"{value}\"; expected \"directory\" or \"github\"")]
    UnknownSink {
        /// The rejected sink name.
        value: String,
    },

    /// `init` found an existing configuration file.
    #[error("shipwright already initialised at {path}")]
    AlreadyInitialised {
        /// Path of the existing file.
        path: Utf8PathBuf,
    },

    /// The configuration file could not be written.
    #[error("failed to write {path}")]
    Write {
        /// Path of the file being written.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A path is not valid UTF-8.
    #[error("path is not valid UTF-8: {path}")]
    NonUtf8Path {
        /// Lossy rendering of the path.
        path: String,
    },
}

/// Result type alias using [`ConfigError`].
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_triple_names_the_triple() {
        let err = ConfigError::DuplicateTriple {
            triple: "x86_64-unknown-linux-gnu".to_owned(),
        };
        assert!(err.to_string().contains("x86_64-unknown-linux-gnu"));
    }

    #[test]
    fn read_error_preserves_source() {
        let err = ConfigError::Read {
            path: Utf8PathBuf::from("/tmp/shipwright.toml"),
            source: std::io::Error::other("permission denied"),
        };
        assert!(err.to_string().contains("/tmp/shipwright.toml"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn missing_publish_setting_names_sink_and_field() {
        let err = ConfigError::MissingPublishSetting {
            sink: "github",
            field: "repository",
        };
        let msg = err.to_string();
        assert!(msg.contains("github"));
        assert!(msg.contains("repository"));
    }
}
