//! npm-compatible registry client.
//!
//! Resolves a package version to its tarball and streams the tarball to disk,
//! verifying the `sha512` integrity digest on the fly when the registry
//! publishes one.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::StreamExt;
use reqwest::{Client, Url};
use sha2::{Digest, Sha512};
use sourcemaps_schema::{Dist, Integrity, PackageRef, Packument, ResolveError};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const PACKUMENT_ACCEPT: &str =
    "application/vnd.npm.install-v1+json; q=1.0, application/json; q=0.8, */*";

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry replied with HTTP {status} for {url}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Integrity mismatch: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },
}

/// A version resolved against the registry metadata.
#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    pub name: String,
    /// Concrete version (dist-tags already resolved).
    pub version: String,
    pub dist: Dist,
}

/// Registry client bound to one registry and optional bearer token.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    quiet: bool,
}

impl RegistryClient {
    pub fn new(client: Client, base_url: &str, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            quiet: false,
        }
    }

    /// Demote progress messages to `debug` level.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    fn progress(&self, msg: &str) {
        if self.quiet {
            debug!("{msg}");
        } else {
            info!("{msg}");
        }
    }

    /// Fetch the metadata document for `pkg`.
    pub async fn packument(&self, pkg: &PackageRef) -> Result<Packument, RegistryError> {
        let url = format!("{}/{}", self.base_url, pkg.registry_path());
        debug!(url = %url, "fetching package metadata");

        let mut req = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .header(reqwest::header::ACCEPT, PACKUMENT_ACCEPT);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(status_error(url, resp).await);
        }
        Ok(resp.json().await?)
    }

    /// Resolve `pkg` (version or dist-tag) to a concrete version and tarball.
    pub async fn resolve(&self, pkg: &PackageRef) -> Result<ResolvedPackage, RegistryError> {
        let packument = self.packument(pkg).await?;
        let (version, dist) = packument.resolve(&pkg.version)?;
        if version != pkg.version {
            self.progress(&format!("resolved {pkg} to version {version}"));
        }
        self.progress(&format!("found tarball for '{}': {}", pkg.name, dist.tarball));

        Ok(ResolvedPackage {
            name: pkg.name.clone(),
            version: version.to_string(),
            dist: dist.clone(),
        })
    }

    /// Stream the tarball of `resolved` into `dest`, returning the byte count.
    ///
    /// The bearer token is only sent when the tarball is served from the same
    /// origin as the registry.
    pub async fn download(
        &self,
        resolved: &ResolvedPackage,
        dest: &Path,
    ) -> Result<u64, RegistryError> {
        let url = resolved.dist.tarball.as_str();

        let mut req = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT);
        if let Some(token) = &self.token {
            if same_origin(url, &self.base_url) {
                req = req.bearer_auth(token);
            } else {
                debug!(url, "tarball served from another origin, not sending token");
            }
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(status_error(url.to_string(), resp).await);
        }

        let integrity = resolved.dist.integrity.as_deref().and_then(Integrity::parse);
        let mut hasher = match &integrity {
            Some(sri) if sri.algorithm == "sha512" => Some(Sha512::new()),
            Some(sri) => {
                warn!(algorithm = %sri.algorithm, "unsupported integrity algorithm, skipping check");
                None
            }
            None => None,
        };

        let mut file = File::create(dest).await?;
        let mut stream = resp.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            if let Some(h) = hasher.as_mut() {
                h.update(&chunk);
            }
            downloaded += chunk.len() as u64;
        }
        file.flush().await?;

        if let (Some(sri), Some(h)) = (integrity, hasher) {
            let actual = STANDARD.encode(h.finalize());
            if actual != sri.digest {
                tokio::fs::remove_file(dest).await.ok();
                return Err(RegistryError::IntegrityMismatch {
                    expected: sri.digest,
                    actual,
                });
            }
            debug!("tarball integrity verified");
        }

        self.progress(&format!(
            "downloaded {} ({downloaded} bytes) to {}",
            resolved.dist.tarball,
            dest.display()
        ));
        Ok(downloaded)
    }
}

/// True when both URLs parse and share scheme, host and effective port.
fn same_origin(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a.origin() == b.origin(),
        _ => false,
    }
}

/// Build a status error, preferring the registry's JSON `error` field.
async fn status_error(url: String, resp: reqwest::Response) -> RegistryError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or(body);

    let message = if message.is_empty() {
        status.canonical_reason().unwrap_or("unknown status").to_string()
    } else {
        message
    };

    RegistryError::Status {
        url,
        status: status.as_u16(),
        message,
    }
}
