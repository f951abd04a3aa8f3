//! sentry-sourcemaps CLI
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Publishes the JavaScript source maps shipped inside a released npm package
//! to Sentry, so stack traces from production can be symbolicated.
//!
//! # Flow
//!
//! ```text
//! registry ──> tarball ──> extract ──> release ──> upload (N at a time)
//! ```

pub mod ui;

use std::time::Duration;

use clap::{Parser, ValueEnum};
use reqwest::Url;
use sourcemaps_core::npmrc::NpmConfig;
use sourcemaps_core::orchestrator::DEFAULT_CONCURRENCY;
use sourcemaps_core::publish::DEFAULT_TIMEOUT;
use sourcemaps_core::tracker::AuthScheme;
use sourcemaps_core::{PublishConfig, PublishReport};
use sourcemaps_schema::{
    DEFAULT_MAP_PATTERN, DEFAULT_STRIP_PREFIX, PROGRAM_NAME, PackageRef, PackageRefError,
    SOURCE_PATTERN,
};

pub use sourcemaps_core::USER_AGENT;

/// Exit status when the run was cancelled with Ctrl-C.
pub const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthArg {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// `Authorization: Basic base64(<token>:)`
    Basic,
}

impl From<AuthArg> for AuthScheme {
    fn from(arg: AuthArg) -> Self {
        match arg {
            AuthArg::Bearer => Self::Bearer,
            AuthArg::Basic => Self::Basic,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = PROGRAM_NAME)]
#[command(author, version, about = "Publish an npm package's source maps to Sentry")]
pub struct Cli {
    /// Package name, e.g. `my-app` or `@scope/my-app`
    pub package: String,

    /// Version or dist-tag to publish (e.g. `1.4.2`, `latest`)
    #[arg(id = "package_version", value_name = "VERSION")]
    pub version: String,

    /// URL the application serves its assets from (e.g. https://fantastic.app/js)
    #[arg(value_parser = parse_url)]
    pub app_url: String,

    /// Sentry auth token (or legacy API key with --auth-scheme basic)
    #[arg(env = "SENTRY_AUTH_TOKEN", hide_env_values = true)]
    pub org_token: String,

    /// Registry URL [default: from .npmrc, else https://registry.npmjs.org]
    #[arg(long, env = "NPM_REGISTRY", value_parser = parse_url)]
    pub registry: Option<String>,

    /// Registry bearer token [default: matching _authToken in .npmrc]
    #[arg(long, env = "NPM_TOKEN", hide_env_values = true)]
    pub registry_token: Option<String>,

    /// Glob selecting files to upload, relative to the package root (repeatable)
    #[arg(long = "pattern", value_name = "GLOB", default_value = DEFAULT_MAP_PATTERN)]
    pub patterns: Vec<String>,

    /// Also upload JavaScript sources (`**/*.js`)
    #[arg(long)]
    pub include_sources: bool,

    /// Path fragment removed before building public names
    #[arg(long, value_name = "PREFIX", default_value = DEFAULT_STRIP_PREFIX)]
    pub strip_prefix: String,

    /// Sentry base URL
    #[arg(long, env = "SENTRY_URL", default_value = "https://sentry.io", value_parser = parse_url)]
    pub sentry_url: String,

    /// Sentry organization slug
    #[arg(long, env = "SENTRY_ORG", default_value = "sentry")]
    pub sentry_organization: String,

    /// Sentry project the release belongs to (repeatable) [default: package name]
    #[arg(long = "sentry-project", value_name = "PROJECT")]
    pub sentry_projects: Vec<String>,

    /// How the token is sent to Sentry
    #[arg(long, value_enum, default_value_t = AuthArg::Bearer)]
    pub auth_scheme: AuthArg,

    /// Uploads in flight at once
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout: u64,

    /// Exit 0 even if some files failed to upload
    #[arg(long)]
    pub lenient: bool,

    /// Download and extract, print the planned uploads, send nothing to Sentry
    #[arg(long)]
    pub dry_run: bool,

    /// Print the summary (or plan) as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Suppress per-file progress lines
    #[arg(short, long)]
    pub quiet: bool,
}

/// Accept absolute http(s) URLs only, keeping the argument as typed.
fn parse_url(input: &str) -> Result<String, String> {
    let url = input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(input.to_string()),
        scheme => Err(format!(
            "invalid URL '{input}': expected http or https, got '{scheme}:'"
        )),
    }
}

impl Cli {
    /// Build the run configuration, filling registry settings from `npmrc`
    /// where no flag or environment variable was given.
    pub fn into_config(self, npmrc: &NpmConfig) -> Result<PublishConfig, PackageRefError> {
        let package = PackageRef::new(self.package, self.version)?;

        let registry_url = self
            .registry
            .unwrap_or_else(|| npmrc.registry_or_default().to_string());
        let registry_token = self
            .registry_token
            .or_else(|| npmrc.token_for(&registry_url).map(str::to_string));

        let mut patterns = self.patterns;
        if self.include_sources && !patterns.iter().any(|p| p == SOURCE_PATTERN) {
            patterns.push(SOURCE_PATTERN.to_string());
        }

        Ok(PublishConfig {
            package,
            registry_url,
            registry_token,
            sentry_url: self.sentry_url,
            organization: self.sentry_organization,
            projects: self.sentry_projects,
            org_token: self.org_token,
            auth_scheme: self.auth_scheme.into(),
            app_url: self.app_url,
            strip_prefix: self.strip_prefix,
            patterns,
            concurrency: self.concurrency.max(1),
            timeout: Duration::from_secs(self.timeout.max(1)),
            dry_run: self.dry_run,
            quiet: self.quiet,
        })
    }
}

/// Exit status for a finished run: 0 unless something failed in strict mode.
pub fn exit_code(report: &PublishReport, lenient: bool) -> u8 {
    if report.is_success() || lenient { 0 } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sourcemaps_schema::{FailureReason, FileReport, RunSummary, UploadOutcome};
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec![PROGRAM_NAME, "fantastic", "1.0.0", "https://fantastic.app/js", "TOKEN"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.patterns, vec![DEFAULT_MAP_PATTERN.to_string()]);
        assert_eq!(cli.strip_prefix, "dist");
        assert_eq!(cli.concurrency, 4);
        assert_eq!(cli.auth_scheme, AuthArg::Bearer);
        assert!(!cli.lenient);

        let config = cli.into_config(&NpmConfig::default()).unwrap();
        assert_eq!(config.registry_url, "https://registry.npmjs.org");
        assert!(config.registry_token.is_none());
        assert!(config.projects.is_empty());
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_npmrc_fills_registry_and_token() {
        let npmrc = NpmConfig::parse(
            "registry=https://npm.acme.dev/\n//npm.acme.dev/:_authToken=SECRET\n",
        );
        let config = parse(&[]).into_config(&npmrc).unwrap();
        assert_eq!(config.registry_url, "https://npm.acme.dev/");
        assert_eq!(config.registry_token.as_deref(), Some("SECRET"));
    }

    #[test]
    fn test_flags_override_npmrc() {
        let npmrc = NpmConfig::parse("registry=https://npm.acme.dev/\n");
        let config = parse(&["--registry", "http://localhost:4873", "--registry-token", "T"])
            .into_config(&npmrc)
            .unwrap();
        assert_eq!(config.registry_url, "http://localhost:4873");
        assert_eq!(config.registry_token.as_deref(), Some("T"));
    }

    #[test]
    fn test_include_sources_and_repeatable_flags() {
        let config = parse(&[
            "--pattern",
            "**/*.js.map",
            "--include-sources",
            "--sentry-project",
            "web",
            "--sentry-project",
            "admin",
            "--auth-scheme",
            "basic",
            "--concurrency",
            "0",
        ])
        .into_config(&NpmConfig::default())
        .unwrap();
        assert_eq!(config.patterns, vec!["**/*.js.map", SOURCE_PATTERN]);
        assert_eq!(config.projects, vec!["web", "admin"]);
        assert_eq!(config.auth_scheme, AuthScheme::Basic);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_url_flags_validated() {
        let argv = |flag: &'static str, value: &'static str| {
            vec![
                PROGRAM_NAME,
                "fantastic",
                "1.0.0",
                "https://fantastic.app/js",
                "TOKEN",
                flag,
                value,
            ]
        };
        for (flag, value) in [
            ("--sentry-url", "sentry.io"),
            ("--sentry-url", "localhost:9000"),
            ("--registry", "npm.acme.dev"),
            ("--registry", "ftp://npm.acme.dev"),
        ] {
            let err = Cli::try_parse_from(argv(flag, value)).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation, "{flag} {value}");
        }

        let err = Cli::try_parse_from([PROGRAM_NAME, "fantastic", "1.0.0", "fantastic.app/js", "TOKEN"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let cli = parse(&["--sentry-url", "http://127.0.0.1:9000/"]);
        assert_eq!(cli.sentry_url, "http://127.0.0.1:9000/");
    }

    #[test]
    fn test_missing_positionals_rejected() {
        assert!(Cli::try_parse_from([PROGRAM_NAME, "fantastic"]).is_err());
    }

    #[test]
    fn test_exit_code_policy() {
        let failed = RunSummary::new(
            None,
            vec![FileReport {
                local_path: PathBuf::from("a.map"),
                public_name: None,
                outcome: UploadOutcome::failed(FailureReason::Transport {
                    message: "reset".to_string(),
                }),
            }],
        );
        let report = PublishReport::Uploaded(failed);
        assert_eq!(exit_code(&report, false), 1);
        assert_eq!(exit_code(&report, true), 0);
        assert_eq!(
            exit_code(&PublishReport::Uploaded(RunSummary::default()), false),
            0
        );
    }
}
