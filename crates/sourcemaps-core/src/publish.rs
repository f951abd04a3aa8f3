//! End-to-end publish pipeline.
//!
//! Resolve the package on the registry, download and extract its tarball into
//! a temporary directory, then hand the tree to the [`Orchestrator`]. The
//! temporary directory lives exactly as long as the returned future, so a
//! cancelled run cleans up after itself.

use std::time::{Duration, Instant};

use reqwest::Client;
use sourcemaps_schema::{PROGRAM_NAME, PackageRef, ReleaseDescriptor, RunSummary};
use thiserror::Error;
use tracing::{debug, info};

use crate::Reporter;
use crate::extract::{ExtractError, extract_tar_gz_async};
use crate::orchestrator::{Orchestrator, UploadConfig, UploadPlan};
use crate::registry::{RegistryClient, RegistryError};
use crate::tracker::{AuthScheme, Endpoints, SentryClient, TrackerError};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fatal pipeline errors. The message names the step that failed.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("download failed: {0}")]
    Download(#[from] RegistryError),

    #[error("download failed: {0}")]
    TempDir(#[source] std::io::Error),

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("registration failed: {0}")]
    Registration(#[from] TrackerError),

    #[error("registration failed: invalid pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("registration failed: cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl PublishError {
    /// Pipeline step the error belongs to.
    pub fn step(&self) -> &'static str {
        match self {
            Self::Download(_) | Self::TempDir(_) => "download",
            Self::Extraction(_) => "extraction",
            Self::Registration(_) | Self::Pattern(_) | Self::Client(_) => "registration",
        }
    }
}

/// Everything a publish run needs.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub package: PackageRef,
    pub registry_url: String,
    pub registry_token: Option<String>,
    pub sentry_url: String,
    pub organization: String,
    /// Projects the release belongs to; empty means "the package name".
    pub projects: Vec<String>,
    pub org_token: String,
    pub auth_scheme: AuthScheme,
    pub app_url: String,
    pub strip_prefix: String,
    pub patterns: Vec<String>,
    pub concurrency: usize,
    pub timeout: Duration,
    /// Compute the plan only; nothing is sent to the tracking service.
    pub dry_run: bool,
    pub quiet: bool,
}

/// What a publish run produced.
#[derive(Debug, Clone)]
pub enum PublishReport {
    /// Uploads ran.
    Uploaded(RunSummary),
    /// Dry run: targets that would have been uploaded.
    Planned(UploadPlan),
}

impl PublishReport {
    /// True when nothing failed (uploads or mappings).
    pub fn is_success(&self) -> bool {
        match self {
            Self::Uploaded(summary) => summary.is_success(),
            Self::Planned(plan) => plan.rejected.is_empty(),
        }
    }
}

/// Shared HTTP client for registry and tracker calls.
pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(crate::USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .timeout(timeout)
        .tcp_nodelay(true)
        .build()
}

/// Run the whole pipeline for `config`.
///
/// # Errors
///
/// Fails only for problems that prevent producing a summary: client setup,
/// package download and extraction. Upload failures are part of the report.
pub async fn publish<R: Reporter>(
    config: &PublishConfig,
    reporter: R,
) -> Result<PublishReport, PublishError> {
    let started = Instant::now();
    let client = http_client(config.timeout).map_err(PublishError::Client)?;

    let registry = RegistryClient::new(
        client.clone(),
        &config.registry_url,
        config.registry_token.clone(),
    )
    .quiet(config.quiet);

    // Resolve first: the release is named after the concrete version.
    reporter.section(&format!("Resolving {}", config.package));
    let resolved = registry.resolve(&config.package).await?;

    let projects = if config.projects.is_empty() {
        vec![config.package.name.clone()]
    } else {
        config.projects.clone()
    };
    let release = ReleaseDescriptor::new(resolved.version.clone(), projects);

    // Client and patterns are validated before any bytes are downloaded.
    let tracker = SentryClient::new(
        client,
        Endpoints::sentry(&config.sentry_url, &config.organization, &release.version),
        &config.org_token,
        config.auth_scheme,
    )?;
    let upload = UploadConfig::new(release, config.app_url.clone())
        .with_strip_prefix(config.strip_prefix.clone())
        .with_patterns(config.patterns.clone())
        .with_concurrency(config.concurrency);
    let orchestrator = Orchestrator::new(tracker, upload, &reporter)?;

    let workdir = tempfile::Builder::new()
        .prefix(&format!("{PROGRAM_NAME}-"))
        .tempdir()
        .map_err(PublishError::TempDir)?;
    debug!(dir = %workdir.path().display(), "created working directory");

    reporter.section(&format!("Downloading {}@{}", resolved.name, resolved.version));
    let archive = workdir.path().join("package.tgz");
    registry.download(&resolved, &archive).await?;

    reporter.section("Extracting");
    let tree = extract_tar_gz_async(&archive, &workdir.path().join("tree")).await?;
    info!(files = tree.file_count, "package extracted");

    if config.dry_run {
        let plan = orchestrator.plan(&tree);
        reporter.section(&format!("Dry run: {} file(s) would be uploaded", plan.targets.len()));
        for target in &plan.targets {
            reporter.planned(target);
        }
        for report in &plan.rejected {
            reporter.file_done(report);
        }
        return Ok(PublishReport::Planned(plan));
    }

    let summary = orchestrator.run(&tree).await;
    reporter.summary(&summary, started.elapsed().as_secs_f64());
    Ok(PublishReport::Uploaded(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use crate::extract::tests::write_tarball;
    use mockito::{Matcher, Server, ServerGuard};
    use sourcemaps_schema::{DEFAULT_MAP_PATTERN, ReleaseResult};

    const APP: &str = "https://fantastic.app/js";

    fn config(registry: &str, sentry: &str) -> PublishConfig {
        PublishConfig {
            package: PackageRef::new("fantastic", "latest").unwrap(),
            registry_url: registry.to_string(),
            registry_token: None,
            sentry_url: sentry.to_string(),
            organization: "acme".to_string(),
            projects: Vec::new(),
            org_token: "FAKETOKEN".to_string(),
            auth_scheme: AuthScheme::Basic,
            app_url: APP.to_string(),
            strip_prefix: "dist".to_string(),
            patterns: vec![DEFAULT_MAP_PATTERN.to_string()],
            concurrency: 2,
            timeout: Duration::from_secs(5),
            dry_run: false,
            quiet: true,
        }
    }

    async fn serve_package(server: &mut ServerGuard) -> Vec<mockito::Mock> {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pkg.tgz");
        write_tarball(
            &archive,
            &[
                ("package/package.json", "{}"),
                ("package/dist/app.js", "console.log(1)"),
                ("package/dist/app.js.map", "{\"version\":3}"),
                ("package/dist/vendor/lib.js.map", "{\"version\":3}"),
            ],
        );
        let bytes = std::fs::read(&archive).unwrap();
        let base = server.url();

        let meta = server
            .mock("GET", "/fantastic")
            .with_status(200)
            .with_body(format!(
                r#"{{"name":"fantastic","dist-tags":{{"latest":"3.1.4"}},
                    "versions":{{"3.1.4":{{"dist":{{"tarball":"{base}/fantastic/-/fantastic-3.1.4.tgz"}}}}}}}}"#
            ))
            .create_async()
            .await;
        let tgz = server
            .mock("GET", "/fantastic/-/fantastic-3.1.4.tgz")
            .with_status(200)
            .with_body(bytes)
            .create_async()
            .await;
        vec![meta, tgz]
    }

    #[tokio::test]
    async fn test_publish_end_to_end() {
        let mut registry = Server::new_async().await;
        let _pkg = serve_package(&mut registry).await;
        let mut sentry = Server::new_async().await;

        let release = sentry
            .mock("POST", "/api/0/organizations/acme/releases/")
            .match_header("authorization", "Basic RkFLRVRPS0VOOg==")
            .match_body(Matcher::Json(serde_json::json!({
                "version": "3.1.4",
                "projects": ["fantastic"]
            })))
            .with_status(201)
            .create_async()
            .await;
        let uploads = sentry
            .mock("POST", "/api/0/organizations/acme/releases/3.1.4/files/")
            .match_body(Matcher::AnyOf(vec![
                Matcher::Regex(format!("{APP}/app\\.js\\.map")),
                Matcher::Regex(format!("{APP}/vendor/lib\\.js\\.map")),
            ]))
            .with_status(201)
            .expect(2)
            .create_async()
            .await;

        let cfg = config(&registry.url(), &sentry.url());
        let report = publish(&cfg, NullReporter).await.unwrap();

        release.assert_async().await;
        uploads.assert_async().await;
        let PublishReport::Uploaded(summary) = report else {
            panic!("expected an upload run");
        };
        assert_eq!(summary.release, Some(ReleaseResult::Created));
        assert_eq!(summary.uploaded(), 2);
        assert!(summary.is_success());
    }

    #[tokio::test]
    async fn test_dry_run_contacts_no_tracker() {
        let mut registry = Server::new_async().await;
        let _pkg = serve_package(&mut registry).await;
        let mut sentry = Server::new_async().await;
        let nothing = sentry
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let mut cfg = config(&registry.url(), &sentry.url());
        cfg.dry_run = true;
        let report = publish(&cfg, NullReporter).await.unwrap();

        nothing.assert_async().await;
        let PublishReport::Planned(plan) = report else {
            panic!("expected a plan");
        };
        let names: Vec<_> = plan.targets.iter().map(|t| t.public_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "https://fantastic.app/js/app.js.map",
                "https://fantastic.app/js/vendor/lib.js.map"
            ]
        );
        assert!(plan.rejected.is_empty());
    }

    #[tokio::test]
    async fn test_missing_package_is_download_failure() {
        let mut registry = Server::new_async().await;
        let _m = registry
            .mock("GET", "/fantastic")
            .with_status(404)
            .with_body(r#"{"error":"Not found"}"#)
            .create_async()
            .await;

        let cfg = config(&registry.url(), "http://127.0.0.1:1");
        let err = publish(&cfg, NullReporter).await.unwrap_err();
        assert_eq!(err.step(), "download");
        assert!(err.to_string().starts_with("download failed: "));
    }

    #[tokio::test]
    async fn test_corrupt_tarball_is_extraction_failure() {
        let mut registry = Server::new_async().await;
        let base = registry.url();
        let _meta = registry
            .mock("GET", "/fantastic")
            .with_status(200)
            .with_body(format!(
                r#"{{"versions":{{"1.0.0":{{"dist":{{"tarball":"{base}/f.tgz"}}}}}},"dist-tags":{{"latest":"1.0.0"}}}}"#
            ))
            .create_async()
            .await;
        let _tgz = registry
            .mock("GET", "/f.tgz")
            .with_status(200)
            .with_body("HELLOWORLD")
            .create_async()
            .await;

        let cfg = config(&base, "http://127.0.0.1:1");
        let err = publish(&cfg, NullReporter).await.unwrap_err();
        assert_eq!(err.step(), "extraction");
    }

    #[tokio::test]
    async fn test_invalid_pattern_fails_before_download() {
        let mut registry = Server::new_async().await;
        let _pkg = serve_package(&mut registry).await;

        let mut cfg = config(&registry.url(), "http://127.0.0.1:1");
        cfg.patterns = vec!["a/***".to_string()];
        let err = publish(&cfg, NullReporter).await.unwrap_err();
        assert!(matches!(err, PublishError::Pattern(_)));
        assert_eq!(err.step(), "registration");
    }
}
