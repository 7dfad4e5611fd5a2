//! The target matrix: every platform a run builds for.
//!
//! A [`TargetMatrix`] is validated once when it is constructed and exposes
//! no way to change it afterwards. Adding a target means loading a new
//! configuration.

use crate::error::{ConfigError, Result};
use crate::target::TargetSpec;
use std::collections::{HashMap, HashSet};

/// An ordered, validated set of targets.
///
/// Order follows the configuration file so logs and reports are stable
/// between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetMatrix {
    targets: Vec<TargetSpec>,
}

impl TargetMatrix {
    /// Validate and wrap a list of targets.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyMatrix`] for an empty list,
    /// [`ConfigError::DuplicateTriple`] when a triple repeats,
    /// [`ConfigError::EmptyDisplayName`] when a display name has no usable
    /// characters, and [`ConfigError::DuplicateDisplayName`] when two display
    /// names would yield the same archive name. Triple syntax is enforced
    /// earlier, by [`crate::target::TargetTriple`].
    pub fn new(targets: Vec<TargetSpec>) -> Result<Self> {
        if targets.is_empty() {
            return Err(ConfigError::EmptyMatrix);
        }

        let mut triples: HashSet<&str> = HashSet::with_capacity(targets.len());
        let mut slugs: HashMap<String, &str> = HashMap::with_capacity(targets.len());

        for target in &targets {
            let triple = target.triple().as_str();
            if !triples.insert(triple) {
                return Err(ConfigError::DuplicateTriple {
                    triple: triple.to_owned(),
                });
            }

            let slug = target.slug();
            if slug.is_empty() {
                return Err(ConfigError::EmptyDisplayName {
                    triple: triple.to_owned(),
                });
            }
            if let Some(first) = slugs.insert(slug, target.display_name()) {
                return Err(ConfigError::DuplicateDisplayName {
                    first: first.to_owned(),
                    second: target.display_name().to_owned(),
                });
            }
        }

        Ok(Self { targets })
    }

    /// The targets, in configuration order.
    #[must_use]
    pub fn targets(&self) -> &[TargetSpec] {
        &self.targets
    }

    /// Number of targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Always `false`; an empty matrix is rejected at construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Iterate over the targets in configuration order.
    pub fn iter(&self) -> std::slice::Iter<'_, TargetSpec> {
        self.targets.iter()
    }

    /// Check that every target declares an archive format.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingArchiveFormat`] naming the first target
    /// without one.
    pub fn require_archive_formats(&self) -> Result<()> {
        match self.targets.iter().find(|t| t.archive_format().is_none()) {
            Some(target) => Err(ConfigError::MissingArchiveFormat {
                target: target.display_name().to_owned(),
            }),
            None => Ok(()),
        }
    }
}

impl<'a> IntoIterator for &'a TargetMatrix {
    type Item = &'a TargetSpec;
    type IntoIter = std::slice::Iter<'a, TargetSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{ArchiveFormat, TargetTriple};
    use rstest::{fixture, rstest};

    fn spec(name: &str, triple: &str, format: Option<ArchiveFormat>) -> TargetSpec {
        TargetSpec::new(name, TargetTriple::try_from(triple).expect("valid"), format)
    }

    #[fixture]
    fn linux() -> TargetSpec {
        spec(
            "Linux - X86_64",
            "x86_64-unknown-linux-gnu",
            Some(ArchiveFormat::TarGz),
        )
    }

    #[fixture]
    fn windows() -> TargetSpec {
        spec(
            "Windows - X86_64",
            "x86_64-pc-windows-msvc",
            Some(ArchiveFormat::Zip),
        )
    }

    #[rstest]
    fn preserves_declaration_order(linux: TargetSpec, windows: TargetSpec) {
        let matrix = TargetMatrix::new(vec![windows.clone(), linux.clone()]).expect("valid");
        let names: Vec<&str> = matrix.iter().map(TargetSpec::display_name).collect();
        assert_eq!(names, ["Windows - X86_64", "Linux - X86_64"]);
        assert_eq!(matrix.len(), 2);
    }

    #[test]
    fn rejects_empty_matrix() {
        let err = TargetMatrix::new(Vec::new()).expect_err("empty");
        assert!(matches!(err, ConfigError::EmptyMatrix));
    }

    #[rstest]
    fn rejects_duplicate_triples(linux: TargetSpec) {
        let twin = spec("Linux again", "x86_64-unknown-linux-gnu", None);
        let err = TargetMatrix::new(vec![linux, twin]).expect_err("duplicate");
        assert!(
            matches!(err, ConfigError::DuplicateTriple { ref triple } if triple == "x86_64-unknown-linux-gnu"),
            "unexpected error: {err:?}"
        );
    }

    #[rstest]
    fn rejects_colliding_display_names(linux: TargetSpec) {
        let clash = spec("linux  x86_64", "x86_64-unknown-linux-musl", None);
        let err = TargetMatrix::new(vec![linux, clash]).expect_err("collision");
        assert!(matches!(err, ConfigError::DuplicateDisplayName { .. }));
    }

    #[test]
    fn rejects_unusable_display_name() {
        let err = TargetMatrix::new(vec![spec("---", "x86_64-unknown-linux-gnu", None)])
            .expect_err("empty slug");
        assert!(matches!(err, ConfigError::EmptyDisplayName { .. }));
    }

    #[rstest]
    fn release_requires_archive_formats(linux: TargetSpec) {
        let ci_only = spec("FreeBSD", "x86_64-unknown-freebsd", None);
        let matrix = TargetMatrix::new(vec![linux, ci_only]).expect("valid for CI");
        let err = matrix.require_archive_formats().expect_err("missing format");
        assert!(
            matches!(err, ConfigError::MissingArchiveFormat { ref target } if target == "FreeBSD")
        );
    }

    #[rstest]
    fn complete_formats_pass(linux: TargetSpec, windows: TargetSpec) {
        let matrix = TargetMatrix::new(vec![linux, windows]).expect("valid");
        assert!(matrix.require_archive_formats().is_ok());
    }
}
