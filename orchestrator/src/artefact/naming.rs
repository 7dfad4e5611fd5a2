//! Release archive naming policy.
//!
//! Archives are named `<project>-<tag>-<slug>.<ext>`, where the slug is the
//! filename-safe form of the target's display name, e.g.
//! `rask-v1.4.0-linux-x86_64.tar.gz`.

use shipwright_common::{ArchiveFormat, ReleaseTag, TargetSpec};
use std::fmt;

/// A fully-qualified release archive name.
///
/// # Examples
///
/// ```
/// use shipwright_common::{ArchiveFormat, ReleaseTag, TargetSpec};
/// use shipwright_orchestrator::artefact::naming::ArtefactName;
///
/// let tag = ReleaseTag::parse("v1.4.0", "v").expect("valid tag");
/// let triple = "x86_64-unknown-linux-gnu".try_into().expect("valid triple");
/// let target = TargetSpec::new("Linux - X86_64", triple, Some(ArchiveFormat::TarGz));
///
/// let name = ArtefactName::new("rask", &tag, &target, ArchiveFormat::TarGz);
/// assert_eq!(name.to_string(), "rask-v1.4.0-linux-x86_64.tar.gz");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtefactName {
    project: String,
    tag: String,
    slug: String,
    format: ArchiveFormat,
}

impl ArtefactName {
    /// Name the archive for `target` in release `tag`.
    #[must_use]
    pub fn new(
        project: impl Into<String>,
        tag: &ReleaseTag,
        target: &TargetSpec,
        format: ArchiveFormat,
    ) -> Self {
        Self {
            project: project.into(),
            tag: tag.as_str().to_owned(),
            slug: target.slug(),
            format,
        }
    }

    /// Return the filename as a string.
    #[must_use]
    pub fn filename(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ArtefactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}.{}",
            self.project,
            self.tag,
            self.slug,
            self.format.extension()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn target(name: &str, triple: &str) -> TargetSpec {
        TargetSpec::new(name, triple.try_into().expect("valid triple"), None)
    }

    #[rstest]
    #[case::linux("Linux - X86_64", "x86_64-unknown-linux-gnu", ArchiveFormat::TarGz, "rask-v2.0.0-rc.1-linux-x86_64.tar.gz")]
    #[case::windows("Windows - X86_64", "x86_64-pc-windows-msvc", ArchiveFormat::Zip, "rask-v2.0.0-rc.1-windows-x86_64.zip")]
    #[case::apple("macOS (Apple Silicon)", "aarch64-apple-darwin", ArchiveFormat::TarGz, "rask-v2.0.0-rc.1-macos-apple-silicon.tar.gz")]
    fn filenames_follow_convention(
        #[case] name: &str,
        #[case] triple: &str,
        #[case] format: ArchiveFormat,
        #[case] expected: &str,
    ) {
        let tag = ReleaseTag::parse("v2.0.0-rc.1", "v").expect("valid tag");
        let artefact = ArtefactName::new("rask", &tag, &target(name, triple), format);
        assert_eq!(artefact.filename(), expected);
    }
}
