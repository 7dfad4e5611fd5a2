//! Publication as a GitHub release.
//!
//! The release is created as a draft, every archive and checksum file is
//! uploaded to it, and only then is it flipped public. A failure at any step
//! leaves at most an unpublished draft for the operator to inspect.

use super::{PublishError, PublishReceipt, Publisher, ensure_bundle_complete};
use crate::bundle::ReleaseBundle;
use camino::Utf8Path;
use log::{debug, info};
use serde_json::{Value, json};
use std::sync::OnceLock;
use std::time::Duration;

/// Network timeout for a single API request or upload.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Host receiving asset uploads when the API does not supply one.
const DEFAULT_UPLOADS_URL: &str = "https://uploads.github.com";

/// A draft release created on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRelease {
    /// Numeric release identifier.
    pub id: u64,
    /// Asset upload endpoint, without the URI template suffix.
    pub upload_url: String,
}

/// The release-hosting operations a publisher needs.
///
/// Separated from [`GitHubPublisher`] so tests can drive the publication
/// sequence without network access.
#[cfg_attr(test, mockall::automock)]
pub trait ReleaseHost {
    /// Create an unpublished draft release.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Http`] if the request fails.
    fn create_draft(&self, tag: &str, notes: &str) -> Result<DraftRelease, PublishError>;

    /// Upload one file as a release asset.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Io`] if the file cannot be read and
    /// [`PublishError::Http`] if the upload fails.
    fn upload_asset(&self, draft: &DraftRelease, path: &Utf8Path) -> Result<(), PublishError>;

    /// Make a draft public, returning its public URL.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Http`] if the request fails.
    fn publish_draft(&self, draft: &DraftRelease) -> Result<String, PublishError>;
}

/// GitHub REST API client for one repository.
#[derive(Debug, Clone)]
pub struct GitHubApi {
    api_url: String,
    repository: String,
    token: String,
}

impl GitHubApi {
    /// Create a client for `repository` (`owner/name`).
    #[must_use]
    pub fn new(api_url: &str, repository: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_owned(),
            repository: repository.into(),
            token: token.into(),
        }
    }

    /// URL of the repository's releases collection.
    #[must_use]
    pub fn releases_url(&self) -> String {
        format!("{}/repos/{}/releases", self.api_url, self.repository)
    }

    fn post_json(&self, url: &str, body: &Value) -> Result<Value, PublishError> {
        debug!("POST {url}");
        let mut response = self
            .authorise(http_agent().post(url))
            .send_json(body)
            .map_err(|e| map_ureq_error(url, &e))?;
        response
            .body_mut()
            .read_json::<Value>()
            .map_err(|e| map_ureq_error(url, &e))
    }

    /// Ask GitHub to generate release notes for `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Http`] if the request fails and
    /// [`PublishError::UnexpectedResponse`] if no body is returned.
    pub fn generate_notes(&self, tag: &str) -> Result<String, PublishError> {
        let url = format!("{}/generate-notes", self.releases_url());
        let response = self.post_json(&url, &json!({ "tag_name": tag }))?;
        response["body"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| PublishError::UnexpectedResponse {
                url,
                reason: "missing `body`".to_owned(),
            })
    }

    fn authorise<B>(&self, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        request
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", concat!("shipwright/", env!("CARGO_PKG_VERSION")))
    }
}

impl ReleaseHost for GitHubApi {
    fn create_draft(&self, tag: &str, notes: &str) -> Result<DraftRelease, PublishError> {
        let url = self.releases_url();
        let body = json!({
            "tag_name": tag,
            "name": tag,
            "body": notes,
            "draft": true,
        });
        let response = self.post_json(&url, &body)?;
        parse_draft(&url, &response)
    }

    fn upload_asset(&self, draft: &DraftRelease, path: &Utf8Path) -> Result<(), PublishError> {
        let name = path.file_name().unwrap_or(path.as_str());
        let url = format!("{}?name={name}", draft.upload_url);
        let bytes = std::fs::read(path).map_err(PublishError::io(path))?;
        debug!("uploading {path} ({} bytes) to {url}", bytes.len());
        self.authorise(http_agent().post(&url))
            .header("Content-Type", "application/octet-stream")
            .send(&bytes[..])
            .map_err(|e| map_ureq_error(&url, &e))?;
        Ok(())
    }

    fn publish_draft(&self, draft: &DraftRelease) -> Result<String, PublishError> {
        let url = format!("{}/{}", self.releases_url(), draft.id);
        debug!("PATCH {url}");
        let mut response = self
            .authorise(http_agent().patch(&url))
            .send_json(json!({ "draft": false }))
            .map_err(|e| map_ureq_error(&url, &e))?;
        let body: Value = response
            .body_mut()
            .read_json()
            .map_err(|e| map_ureq_error(&url, &e))?;
        body["html_url"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| PublishError::UnexpectedResponse {
                url,
                reason: "missing `html_url`".to_owned(),
            })
    }
}

/// Publishes bundles as GitHub releases.
#[derive(Debug, Clone)]
pub struct GitHubPublisher<H = GitHubApi> {
    host: H,
}

impl<H: ReleaseHost> GitHubPublisher<H> {
    /// Create a publisher backed by `host`.
    #[must_use]
    pub fn new(host: H) -> Self {
        Self { host }
    }
}

impl<H: ReleaseHost> Publisher for GitHubPublisher<H> {
    fn publish(&self, bundle: &ReleaseBundle) -> Result<PublishReceipt, PublishError> {
        ensure_bundle_complete(bundle)?;

        let tag = bundle.tag().as_str();
        let draft = self.host.create_draft(tag, bundle.notes())?;
        info!("created draft release {tag} (id {})", draft.id);

        let mut assets = 0;
        for artefact in bundle.artifacts() {
            self.host.upload_asset(&draft, &artefact.archive_path)?;
            self.host.upload_asset(&draft, &artefact.checksum_path)?;
            assets += 2;
        }

        let location = self.host.publish_draft(&draft)?;
        info!("published release {tag} at {location}");
        Ok(PublishReceipt { location, assets })
    }
}

fn parse_draft(url: &str, response: &Value) -> Result<DraftRelease, PublishError> {
    let unexpected = |reason: &str| PublishError::UnexpectedResponse {
        url: url.to_owned(),
        reason: reason.to_owned(),
    };
    let id = response["id"]
        .as_u64()
        .ok_or_else(|| unexpected("missing release `id`"))?;
    let upload_url = response["upload_url"]
        .as_str()
        .map_or_else(
            || format!("{DEFAULT_UPLOADS_URL}/releases/{id}/assets"),
            |u| u.split('{').next().unwrap_or(u).to_owned(),
        );
    Ok(DraftRelease { id, upload_url })
}

/// Shared `ureq` agent with request timeout configuration.
fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

fn map_ureq_error(url: &str, err: &ureq::Error) -> PublishError {
    PublishError::Http {
        url: url.to_owned(),
        reason: match err {
            ureq::Error::StatusCode(401 | 403) => {
                "not authorised; check GITHUB_TOKEN permissions".to_owned()
            }
            ureq::Error::StatusCode(422) => {
                "rejected by GitHub (does the release already exist?)".to_owned()
            }
            other => other.to_string(),
        },
    }
}
