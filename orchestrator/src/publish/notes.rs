//! Release notes generation.

use super::PublishError;
use super::github::GitHubApi;
use camino::Utf8PathBuf;
use shipwright_common::ReleaseTag;

/// Produces the notes attached to a release.
#[cfg_attr(test, mockall::automock)]
pub trait NotesGenerator {
    /// Generate notes for `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Notes`] or a transport error if notes cannot
    /// be produced.
    fn generate(&self, tag: &ReleaseTag) -> Result<String, PublishError>;
}

/// Notes read from a file, or a one-line default.
#[derive(Debug, Clone, Default)]
pub struct StaticNotes {
    project: String,
    notes_file: Option<Utf8PathBuf>,
}

impl StaticNotes {
    /// Notes for `project`, taken from `notes_file` when set.
    #[must_use]
    pub fn new(project: impl Into<String>, notes_file: Option<Utf8PathBuf>) -> Self {
        Self {
            project: project.into(),
            notes_file,
        }
    }
}

impl NotesGenerator for StaticNotes {
    fn generate(&self, tag: &ReleaseTag) -> Result<String, PublishError> {
        match &self.notes_file {
            Some(path) => std::fs::read_to_string(path).map_err(|e| PublishError::Notes {
                reason: format!("cannot read {path}: {e}"),
            }),
            None => Ok(format!("{} {}", self.project, tag.as_str())),
        }
    }
}

/// Notes generated by GitHub from the commits since the previous release.
#[derive(Debug, Clone)]
pub struct GitHubNotes {
    api: GitHubApi,
}

impl GitHubNotes {
    /// Generate notes through `api`.
    #[must_use]
    pub fn new(api: GitHubApi) -> Self {
        Self { api }
    }
}

impl NotesGenerator for GitHubNotes {
    fn generate(&self, tag: &ReleaseTag) -> Result<String, PublishError> {
        self.api.generate_notes(tag.as_str())
    }
}
