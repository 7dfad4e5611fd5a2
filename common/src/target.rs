//! Target descriptions for the build matrix.
//!
//! A [`TargetSpec`] pairs a human label with a validated [`TargetTriple`] and
//! the archive format its release artefact uses.

use crate::error::{ConfigError, Result};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum number of `-`-separated components in a triple.
const MIN_TRIPLE_COMPONENTS: usize = 2;

/// Maximum number of `-`-separated components in a triple.
const MAX_TRIPLE_COMPONENTS: usize = 4;

/// A syntactically valid toolchain target triple.
///
/// Triples are two to four `-`-separated components made of ASCII lowercase
/// letters, digits, `_` and `.`. The set of triples is not fixed: whether the
/// toolchain actually supports a triple is only known when it builds.
///
/// # Examples
///
/// ```
/// use shipwright_common::target::TargetTriple;
///
/// let triple: TargetTriple = "x86_64-pc-windows-msvc".try_into().expect("valid");
/// assert!(triple.is_windows());
/// assert_eq!(triple.executable_suffix(), ".exe");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TargetTriple(String);

impl TargetTriple {
    /// Return the triple as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the architecture component (e.g. `x86_64`).
    #[must_use]
    pub fn arch(&self) -> &str {
        self.0.split('-').next().unwrap_or_default()
    }

    /// Whether the triple targets Windows.
    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.0.contains("windows")
    }

    /// Whether the triple targets macOS.
    #[must_use]
    pub fn is_darwin(&self) -> bool {
        self.0.contains("darwin")
    }

    /// File suffix the toolchain appends to executables for this target.
    #[must_use]
    pub fn executable_suffix(&self) -> &'static str {
        if self.is_windows() { ".exe" } else { "" }
    }
}

impl TryFrom<&str> for TargetTriple {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self> {
        validate_triple(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for TargetTriple {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        validate_triple(&value)?;
        Ok(Self(value))
    }
}

impl AsRef<str> for TargetTriple {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn validate_triple(value: &str) -> Result<()> {
    let malformed = |reason: String| ConfigError::MalformedTriple {
        triple: value.to_owned(),
        reason,
    };

    let components: Vec<&str> = value.split('-').collect();
    if !(MIN_TRIPLE_COMPONENTS..=MAX_TRIPLE_COMPONENTS).contains(&components.len()) {
        return Err(malformed(format!(
            "expected {MIN_TRIPLE_COMPONENTS} to {MAX_TRIPLE_COMPONENTS} components, got {}",
            components.len()
        )));
    }
    if components.iter().any(|c| c.is_empty()) {
        return Err(malformed("empty component".to_owned()));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.')))
    {
        return Err(malformed(format!("invalid character '{bad}'")));
    }
    Ok(())
}

/// Archive container used for a target's release artefact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveFormat {
    /// A deflate-compressed zip file.
    #[serde(rename = "zip")]
    Zip,
    /// A gzip-compressed tarball.
    #[serde(rename = "tar.gz")]
    TarGz,
}

impl ArchiveFormat {
    /// File extension without the leading dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
        }
    }

    /// Conventional format for a triple: zip on Windows, tar.gz elsewhere.
    #[must_use]
    pub fn conventional_for(triple: &TargetTriple) -> Self {
        if triple.is_windows() {
            Self::Zip
        } else {
            Self::TarGz
        }
    }
}

impl FromStr for ArchiveFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "zip" => Ok(Self::Zip),
            "tar.gz" | "tgz" => Ok(Self::TarGz),
            other => Err(ConfigError::UnknownArchiveFormat {
                value: other.to_owned(),
            }),
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One entry of the target matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetSpec {
    display_name: String,
    triple: TargetTriple,
    archive_format: Option<ArchiveFormat>,
    extra_files: Vec<Utf8PathBuf>,
}

impl TargetSpec {
    /// Create a target with no per-target extra files.
    #[must_use]
    pub fn new(
        display_name: impl Into<String>,
        triple: TargetTriple,
        archive_format: Option<ArchiveFormat>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            triple,
            archive_format,
            extra_files: Vec::new(),
        }
    }

    /// Attach files packaged only into this target's archive.
    #[must_use]
    pub fn with_extra_files(mut self, extra_files: Vec<Utf8PathBuf>) -> Self {
        self.extra_files = extra_files;
        self
    }

    /// Human label, e.g. `Linux - X86_64`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Toolchain target triple.
    #[must_use]
    pub fn triple(&self) -> &TargetTriple {
        &self.triple
    }

    /// Archive format, if declared.
    #[must_use]
    pub fn archive_format(&self) -> Option<ArchiveFormat> {
        self.archive_format
    }

    /// Files packaged only into this target's archive.
    #[must_use]
    pub fn extra_files(&self) -> &[Utf8PathBuf] {
        &self.extra_files
    }

    /// Archive-name component derived from the display name.
    #[must_use]
    pub fn slug(&self) -> String {
        archive_slug(&self.display_name)
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.triple)
    }
}

/// Reduce a display name to a lowercase, filename-safe component.
///
/// ASCII letters, digits, `_` and `.` are kept; every other run of
/// characters collapses into a single `-`.
///
/// # Examples
///
/// ```
/// use shipwright_common::target::archive_slug;
///
/// assert_eq!(archive_slug("Linux - X86_64"), "linux-x86_64");
/// assert_eq!(archive_slug("macOS (Apple Silicon)"), "macos-apple-silicon");
/// ```
#[must_use]
pub fn archive_slug(display_name: &str) -> String {
    let mut slug = String::with_capacity(display_name.len());
    for c in display_name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::linux_gnu("x86_64-unknown-linux-gnu")]
    #[case::darwin("aarch64-apple-darwin")]
    #[case::msvc("x86_64-pc-windows-msvc")]
    #[case::two_components("wasm32-wasip1")]
    #[case::armv7("armv7-unknown-linux-gnueabihf")]
    fn accepts_well_formed_triples(#[case] triple: &str) {
        let parsed = TargetTriple::try_from(triple).expect("valid triple");
        assert_eq!(parsed.as_str(), triple);
    }

    #[rstest]
    #[case::empty("")]
    #[case::single("x86_64")]
    #[case::too_many("a-b-c-d-e")]
    #[case::empty_component("x86_64--linux")]
    #[case::uppercase("X86_64-unknown-linux-gnu")]
    #[case::whitespace("x86_64-unknown-linux gnu")]
    fn rejects_malformed_triples(#[case] triple: &str) {
        let err = TargetTriple::try_from(triple).expect_err("malformed triple");
        assert!(
            matches!(err, ConfigError::MalformedTriple { .. }),
            "expected MalformedTriple, got {err:?}"
        );
    }

    #[rstest]
    #[case::linux("x86_64-unknown-linux-gnu", "", "x86_64")]
    #[case::windows("x86_64-pc-windows-msvc", ".exe", "x86_64")]
    #[case::mac_arm("aarch64-apple-darwin", "", "aarch64")]
    fn triple_platform_helpers(#[case] triple: &str, #[case] suffix: &str, #[case] arch: &str) {
        let t = TargetTriple::try_from(triple).expect("valid");
        assert_eq!(t.executable_suffix(), suffix);
        assert_eq!(t.arch(), arch);
    }

    #[rstest]
    #[case::zip("zip", ArchiveFormat::Zip)]
    #[case::targz("tar.gz", ArchiveFormat::TarGz)]
    #[case::tgz_alias("tgz", ArchiveFormat::TarGz)]
    fn archive_format_parses(#[case] raw: &str, #[case] expected: ArchiveFormat) {
        assert_eq!(raw.parse::<ArchiveFormat>().expect("known format"), expected);
    }

    #[test]
    fn archive_format_rejects_unknown() {
        let err = "rar".parse::<ArchiveFormat>().expect_err("unknown");
        assert!(matches!(err, ConfigError::UnknownArchiveFormat { .. }));
    }

    #[test]
    fn conventional_format_follows_platform() {
        let win = TargetTriple::try_from("aarch64-pc-windows-msvc").expect("valid");
        let mac = TargetTriple::try_from("aarch64-apple-darwin").expect("valid");
        assert_eq!(ArchiveFormat::conventional_for(&win), ArchiveFormat::Zip);
        assert_eq!(ArchiveFormat::conventional_for(&mac), ArchiveFormat::TarGz);
    }

    #[rstest]
    #[case::spaced_dash("Linux - X86_64", "linux-x86_64")]
    #[case::parens("macOS (Apple Silicon)", "macos-apple-silicon")]
    #[case::trailing("Windows!!", "windows")]
    #[case::leading("  FreeBSD", "freebsd")]
    #[case::symbols_only("***", "")]
    fn slug_examples(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(archive_slug(name), expected);
    }
}
