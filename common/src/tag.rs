//! Release tag parsing.
//!
//! A release is named by a version tag such as `v1.4.0`: an optional fixed
//! prefix followed by a semantic version.

use crate::error::{ConfigError, Result};
use semver::Version;
use serde::Serialize;
use std::fmt;

/// Prefix used when the configuration does not set one.
pub const DEFAULT_TAG_PREFIX: &str = "v";

/// A validated release tag.
///
/// # Examples
///
/// ```
/// use shipwright_common::tag::ReleaseTag;
///
/// let tag = ReleaseTag::parse("v1.4.0-rc.1", "v").expect("valid tag");
/// assert_eq!(tag.as_str(), "v1.4.0-rc.1");
/// assert!(tag.is_prerelease());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReleaseTag {
    raw: String,
    #[serde(skip)]
    version: Version,
}

impl ReleaseTag {
    /// Parse `raw` as `<prefix><semver>`.
    ///
    /// An empty prefix accepts bare versions such as `1.4.0`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTag`] when the prefix is absent or the
    /// remainder is not a semantic version.
    pub fn parse(raw: &str, prefix: &str) -> Result<Self> {
        let invalid = |reason: String| ConfigError::InvalidTag {
            tag: raw.to_owned(),
            reason,
        };

        let Some(rest) = raw.strip_prefix(prefix) else {
            return Err(invalid(format!("expected prefix \"{prefix}\"")));
        };
        let version = Version::parse(rest).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            raw: raw.to_owned(),
            version,
        })
    }

    /// The tag exactly as written, e.g. `v1.4.0`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The parsed semantic version.
    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Whether the version carries a pre-release component.
    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        !self.version.pre.is_empty()
    }
}

impl fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
