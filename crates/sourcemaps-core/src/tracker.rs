//! Error-tracking service client (Sentry releases API).
//!
//! Two calls matter: registering a release and attaching a file to it. Both
//! translate every HTTP and transport result into a value instead of an
//! error, because neither may abort the run.

use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, HeaderValue, USER_AGENT};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode};
use sourcemaps_schema::{FailureReason, ReleaseDescriptor, ReleaseResult, UploadOutcome, UploadTarget};
use thiserror::Error;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("auth token cannot be sent as an HTTP header")]
    InvalidToken,
}

/// How the auth token is presented to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>` (auth tokens).
    #[default]
    Bearer,
    /// `Authorization: Basic base64(<token>:)` (legacy API keys).
    Basic,
}

/// Release and file endpoints for one release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub releases: String,
    pub files: String,
}

impl Endpoints {
    /// Sentry organization-level endpoints:
    /// `<base>/api/0/organizations/<org>/releases/` and `<releases><version>/files/`.
    pub fn sentry(base_url: &str, organization: &str, version: &str) -> Self {
        let releases = format!(
            "{}/api/0/organizations/{organization}/releases/",
            base_url.trim_end_matches('/')
        );
        let files = format!("{releases}{version}/files/");
        Self { releases, files }
    }
}

/// Operations the upload orchestrator needs from the tracking service.
#[async_trait]
pub trait TrackerApi: Send + Sync {
    /// Create the release, or confirm it exists. One request, never fatal.
    async fn create_release(&self, release: &ReleaseDescriptor) -> ReleaseResult;

    /// Upload one file under its public name. One request, no retries.
    async fn upload_file(&self, target: &UploadTarget) -> UploadOutcome;
}

/// Sentry HTTP client.
#[derive(Debug, Clone)]
pub struct SentryClient {
    client: Client,
    endpoints: Endpoints,
    authorization: HeaderValue,
}

impl SentryClient {
    pub fn new(
        client: Client,
        endpoints: Endpoints,
        token: &str,
        scheme: AuthScheme,
    ) -> Result<Self, TrackerError> {
        let value = match scheme {
            AuthScheme::Bearer => format!("Bearer {token}"),
            AuthScheme::Basic => format!("Basic {}", STANDARD.encode(format!("{token}:"))),
        };
        let mut authorization =
            HeaderValue::from_str(&value).map_err(|_| TrackerError::InvalidToken)?;
        authorization.set_sensitive(true);

        Ok(Self {
            client,
            endpoints,
            authorization,
        })
    }

    async fn file_part(path: &Path) -> std::io::Result<Part> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map_or_else(|| "file".to_string(), |n| n.to_string_lossy().into_owned());

        let body = Body::wrap_stream(ReaderStream::new(file));
        Ok(Part::stream_with_length(body, len).file_name(file_name))
    }
}

#[async_trait]
impl TrackerApi for SentryClient {
    async fn create_release(&self, release: &ReleaseDescriptor) -> ReleaseResult {
        debug!(url = %self.endpoints.releases, version = %release.version, "creating release");

        let resp = self
            .client
            .post(&self.endpoints.releases)
            .header(USER_AGENT, crate::USER_AGENT)
            .header(AUTHORIZATION, self.authorization.clone())
            .json(release)
            .send()
            .await;

        match resp {
            Ok(resp) if resp.status().is_success() => ReleaseResult::Created,
            Ok(resp) => {
                let code = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                warn!(code, body = %body, "release creation rejected, continuing with uploads");
                ReleaseResult::Rejected { code, body }
            }
            Err(e) => {
                let reason = error_chain(&e);
                warn!(reason = %reason, "release registrar unreachable, continuing with uploads");
                ReleaseResult::Unreachable { reason }
            }
        }
    }

    async fn upload_file(&self, target: &UploadTarget) -> UploadOutcome {
        let part = match Self::file_part(&target.local_path).await {
            Ok(part) => part,
            Err(e) => {
                return UploadOutcome::failed(FailureReason::Io {
                    message: format!("{}: {e}", target.local_path.display()),
                });
            }
        };
        let form = Form::new()
            .part("file", part)
            .text("name", target.public_name.clone());

        debug!(url = %self.endpoints.files, name = %target.public_name, "uploading file");
        let resp = self
            .client
            .post(&self.endpoints.files)
            .header(USER_AGENT, crate::USER_AGENT)
            .header(AUTHORIZATION, self.authorization.clone())
            .multipart(form)
            .send()
            .await;

        match resp {
            Ok(resp) => match resp.status() {
                StatusCode::OK | StatusCode::CREATED => UploadOutcome::Uploaded,
                StatusCode::CONFLICT => UploadOutcome::AlreadyExists,
                status => {
                    let body = resp.text().await.unwrap_or_default();
                    UploadOutcome::failed(FailureReason::Rejected {
                        code: status.as_u16(),
                        body,
                    })
                }
            },
            Err(e) => UploadOutcome::failed(FailureReason::Transport {
                message: error_chain(&e),
            }),
        }
    }
}

/// Render an error with its sources; reqwest hides the interesting part there.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
