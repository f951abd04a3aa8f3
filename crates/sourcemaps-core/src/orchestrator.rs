//! Upload orchestration.
//!
//! Registers the release, discovers candidate files in an extracted package,
//! maps them to public names and uploads them with bounded concurrency. A
//! single file's failure never stops the run; it ends up in the summary.
//!
//! ```text
//! create_release ──> discover ──> map ──┬──> upload ──┐
//!                                       └─ Failed(config)
//!                                                     └──> RunSummary
//! ```

use std::path::{Path, PathBuf};

use futures::{StreamExt, stream};
use glob::{MatchOptions, Pattern, PatternError};
use serde::Serialize;
use sourcemaps_schema::{
    DEFAULT_MAP_PATTERN, DEFAULT_STRIP_PREFIX, FailureReason, FileReport, ReleaseDescriptor,
    RunSummary, UploadOutcome, UploadTarget,
};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::Reporter;
use crate::extract::ExtractedTree;
use crate::mapper::PathMapper;
use crate::tracker::TrackerApi;

/// Uploads in flight at once unless configured otherwise.
pub const DEFAULT_CONCURRENCY: usize = 4;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Everything one upload run needs, passed in explicitly.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Literal path fragment removed before building public names.
    pub strip_prefix: String,
    /// Base URL the application serves its assets from.
    pub app_url: String,
    /// Glob patterns, relative to the package directory.
    pub patterns: Vec<String>,
    /// Maximum uploads in flight.
    pub concurrency: usize,
    /// Release registered before any upload.
    pub release: ReleaseDescriptor,
}

impl UploadConfig {
    pub fn new(release: ReleaseDescriptor, app_url: impl Into<String>) -> Self {
        Self {
            strip_prefix: DEFAULT_STRIP_PREFIX.to_string(),
            app_url: app_url.into(),
            patterns: vec![DEFAULT_MAP_PATTERN.to_string()],
            concurrency: DEFAULT_CONCURRENCY,
            release,
        }
    }

    pub fn with_strip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.strip_prefix = prefix.into();
        self
    }

    pub fn with_patterns(mut self, patterns: Vec<String>) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Targets computed for a tree, before anything is sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadPlan {
    /// Files with a valid public name.
    pub targets: Vec<UploadTarget>,
    /// Files whose path could not be mapped, already marked failed.
    pub rejected: Vec<FileReport>,
}

/// Drives the release registrar and the file uploader over one tree.
#[derive(Debug)]
pub struct Orchestrator<A, R> {
    api: A,
    reporter: R,
    config: UploadConfig,
    patterns: Vec<Pattern>,
}

impl<A: TrackerApi, R: Reporter> Orchestrator<A, R> {
    /// # Errors
    ///
    /// Returns an error if one of the configured glob patterns is invalid.
    pub fn new(api: A, config: UploadConfig, reporter: R) -> Result<Self, PatternError> {
        let patterns = config
            .patterns
            .iter()
            .map(|p| Pattern::new(p.trim_start_matches("./")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            api,
            reporter,
            config,
            patterns,
        })
    }

    /// Files under `package_dir` matching any pattern, sorted by path.
    pub fn discover(&self, package_dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(package_dir)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("skipping unreadable entry: {e}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .strip_prefix(package_dir)
                    .is_ok_and(|rel| self.matches(rel))
            })
            .map(walkdir::DirEntry::into_path)
            .collect();

        files.sort();
        debug!(count = files.len(), dir = %package_dir.display(), "discovered candidate files");
        files
    }

    fn matches(&self, relative: &Path) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_path_with(relative, MATCH_OPTIONS))
    }

    /// Discover and map files without contacting the tracking service.
    ///
    /// Names are computed relative to the package directory, so the archive's
    /// wrapper directory never takes part in prefix matching.
    pub fn plan(&self, tree: &ExtractedTree) -> UploadPlan {
        let mapper = PathMapper::new(
            &tree.package_dir,
            self.config.strip_prefix.as_str(),
            self.config.app_url.as_str(),
        );

        let mut plan = UploadPlan::default();
        for path in self.discover(&tree.package_dir) {
            match mapper.map(&path) {
                Ok(target) => plan.targets.push(target),
                Err(e) => {
                    warn!(path = %path.display(), "cannot map file: {e}");
                    plan.rejected.push(FileReport {
                        local_path: path,
                        public_name: None,
                        outcome: UploadOutcome::failed(FailureReason::Config {
                            message: e.to_string(),
                        }),
                    });
                }
            }
        }
        plan
    }

    /// Register the release, then upload every mapped file.
    ///
    /// Never fails: release problems are recorded in the summary and every
    /// per-file problem becomes a `Failed` entry.
    pub async fn run(&self, tree: &ExtractedTree) -> RunSummary {
        let release = &self.config.release;
        self.reporter
            .section(&format!("Registering release {}", release.version));
        let release_result = self.api.create_release(release).await;
        self.reporter.release(release, &release_result);

        let plan = self.plan(tree);
        for report in &plan.rejected {
            self.reporter.file_done(report);
        }

        if !plan.targets.is_empty() {
            self.reporter
                .section(&format!("Uploading {} file(s)", plan.targets.len()));
        }

        let this = self;
        let uploaded: Vec<FileReport> = stream::iter(plan.targets)
            .map(move |target| async move {
                this.reporter.uploading(&target);
                let outcome = this.api.upload_file(&target).await;
                let report = FileReport {
                    local_path: target.local_path,
                    public_name: Some(target.public_name),
                    outcome,
                };
                this.reporter.file_done(&report);
                report
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut files = plan.rejected;
        files.extend(uploaded);
        let summary = RunSummary::new(Some(release_result), files);
        info!(
            uploaded = summary.uploaded(),
            already_exists = summary.already_exists(),
            failed = summary.failed(),
            "upload run finished"
        );
        summary
    }
}
