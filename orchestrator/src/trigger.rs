//! Trigger classification for `shipwright run --ref`.
//!
//! Pushes to branches run the CI check, version tags run the release
//! procedure, and every other ref is ignored.

use log::debug;
use shipwright_common::ReleaseTag;
use shipwright_common::config::TriggerSettings;

const BRANCH_PREFIX: &str = "refs/heads/";
const TAG_PREFIX: &str = "refs/tags/";

/// What a pushed ref should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Run the CI check for a branch push.
    Ci {
        /// The branch name.
        branch: String,
    },
    /// Run the release procedure for a version tag.
    Release(ReleaseTag),
    /// Nothing to run.
    Skip {
        /// Why the ref was ignored.
        reason: String,
    },
}

/// Classify `git_ref` against the trigger settings.
///
/// # Examples
///
/// ```
/// use shipwright_common::config::TriggerSettings;
/// use shipwright_orchestrator::trigger::{Trigger, classify};
///
/// let settings = TriggerSettings {
///     exclude_branches: vec!["gh-pages".to_owned()],
///     tag_prefix: "v".to_owned(),
/// };
/// assert!(matches!(classify("refs/tags/v1.4.0", &settings), Trigger::Release(_)));
/// assert!(matches!(classify("refs/heads/gh-pages", &settings), Trigger::Skip { .. }));
/// ```
#[must_use]
pub fn classify(git_ref: &str, settings: &TriggerSettings) -> Trigger {
    if let Some(branch) = git_ref.strip_prefix(BRANCH_PREFIX) {
        if settings.exclude_branches.iter().any(|b| b == branch) {
            return Trigger::Skip {
                reason: format!("branch {branch} is excluded"),
            };
        }
        return Trigger::Ci {
            branch: branch.to_owned(),
        };
    }

    if let Some(tag) = git_ref.strip_prefix(TAG_PREFIX) {
        return match ReleaseTag::parse(tag, &settings.tag_prefix) {
            Ok(tag) => Trigger::Release(tag),
            Err(e) => {
                debug!("tag {tag} is not a release tag: {e}");
                Trigger::Skip {
                    reason: format!("tag {tag} is not a release tag"),
                }
            }
        };
    }

    Trigger::Skip {
        reason: format!("ref {git_ref} is neither a branch nor a tag"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn settings() -> TriggerSettings {
        TriggerSettings {
            exclude_branches: vec!["gh-pages".to_owned()],
            tag_prefix: "v".to_owned(),
        }
    }

    #[rstest]
    #[case("refs/heads/main", "main")]
    #[case("refs/heads/feature/matrix", "feature/matrix")]
    fn branch_pushes_run_ci(settings: TriggerSettings, #[case] git_ref: &str, #[case] branch: &str) {
        assert_eq!(
            classify(git_ref, &settings),
            Trigger::Ci {
                branch: branch.to_owned()
            }
        );
    }

    #[rstest]
    fn excluded_branch_is_skipped(settings: TriggerSettings) {
        assert!(matches!(
            classify("refs/heads/gh-pages", &settings),
            Trigger::Skip { reason } if reason.contains("excluded")
        ));
    }

    #[rstest]
    #[case("refs/tags/v1.4.0")]
    #[case("refs/tags/v2.0.0-rc.1")]
    fn version_tags_run_a_release(settings: TriggerSettings, #[case] git_ref: &str) {
        let Trigger::Release(tag) = classify(git_ref, &settings) else {
            panic!("expected a release for {git_ref}");
        };
        assert_eq!(Some(tag.as_str()), git_ref.strip_prefix(TAG_PREFIX));
    }

    #[rstest]
    #[case("refs/tags/nightly")]
    #[case("refs/tags/1.4.0")]
    #[case("refs/pull/12/merge")]
    #[case("main")]
    fn other_refs_are_skipped(settings: TriggerSettings, #[case] git_ref: &str) {
        assert!(matches!(classify(git_ref, &settings), Trigger::Skip { .. }));
    }
}
