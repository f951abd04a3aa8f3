//! Reporter trait for dependency injection
//!
//! This trait allows the pipeline to report progress and per-file results
//! without being coupled to a specific terminal renderer.

use sourcemaps_schema::{FileReport, ReleaseDescriptor, ReleaseResult, RunSummary, UploadTarget};

pub trait Reporter: Send + Sync {
    /// Indicates a new step has started (e.g. "Downloading", "Uploading").
    fn section(&self, title: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);

    /// The release registration finished (successfully or not).
    fn release(&self, release: &ReleaseDescriptor, result: &ReleaseResult);

    /// An upload is about to start.
    fn uploading(&self, target: &UploadTarget);

    /// A file reached its final outcome.
    fn file_done(&self, report: &FileReport);

    /// Dry run: a file would be uploaded under this name.
    fn planned(&self, target: &UploadTarget);

    /// Display the final summary of the run.
    fn summary(&self, summary: &RunSummary, elapsed_secs: f64);
}

impl<T: Reporter + ?Sized> Reporter for &T {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn error(&self, msg: &str) {
        (**self).error(msg);
    }
    fn release(&self, release: &ReleaseDescriptor, result: &ReleaseResult) {
        (**self).release(release, result);
    }
    fn uploading(&self, target: &UploadTarget) {
        (**self).uploading(target);
    }
    fn file_done(&self, report: &FileReport) {
        (**self).file_done(report);
    }
    fn planned(&self, target: &UploadTarget) {
        (**self).planned(target);
    }
    fn summary(&self, summary: &RunSummary, elapsed_secs: f64) {
        (**self).summary(summary, elapsed_secs);
    }
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
    fn release(&self, _: &ReleaseDescriptor, _: &ReleaseResult) {}
    fn uploading(&self, _: &UploadTarget) {}
    fn file_done(&self, _: &FileReport) {}
    fn planned(&self, _: &UploadTarget) {}
    fn summary(&self, _: &RunSummary, _: f64) {}
}
