//! Terminal implementation of the core `Reporter` trait.

use std::io::Write;

use crossterm::style::{Stylize, style};
use sourcemaps_core::Reporter;
use sourcemaps_schema::{
    FileReport, ReleaseDescriptor, ReleaseResult, RunSummary, UploadOutcome, UploadTarget,
};
use tracing::debug;

use super::theme::{Theme, truncate_start};

const PATH_WIDTH: usize = 48;

/// Writes progress to stdout and problems to stderr.
#[derive(Debug, Clone, Default)]
pub struct TerminalReporter {
    theme: Theme,
    quiet: bool,
    silent: bool,
}

impl TerminalReporter {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            ..Self::default()
        }
    }

    /// No output at all; used when stdout carries JSON.
    pub fn silent() -> Self {
        Self {
            quiet: true,
            silent: true,
            ..Self::default()
        }
    }

    fn out(&self, line: &str) {
        if self.silent {
            return;
        }
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{line}");
    }

    fn err(&self, line: &str) {
        if self.silent {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{line}");
    }

    fn file_label(report: &FileReport) -> String {
        report.public_name.clone().unwrap_or_else(|| {
            truncate_start(&report.local_path.display().to_string(), PATH_WIDTH)
        })
    }

    fn uploading_line(&self, target: &UploadTarget) -> String {
        format!(
            "  {} {} {}",
            style(self.theme.icons.active).with(self.theme.colors.secondary),
            style("uploading").with(self.theme.colors.secondary),
            style(&target.public_name).with(self.theme.colors.name),
        )
    }

    fn print_failures(&self, summary: &RunSummary) {
        let c = &self.theme.colors;
        let failures: Vec<&FileReport> = summary.failures().collect();
        if failures.is_empty() {
            return;
        }

        self.err(&format!(
            "\n{}",
            style(format!("{} file(s) failed:", failures.len()))
                .with(c.error)
                .bold()
        ));
        let width = failures
            .iter()
            .map(|r| Self::file_label(r).chars().count())
            .max()
            .unwrap_or(0);
        for report in failures {
            let reason = match &report.outcome {
                UploadOutcome::Failed { reason } => reason.to_string(),
                other => other.label().to_string(),
            };
            self.err(&format!(
                "  {} {:<width$}  {}",
                style(self.theme.icons.error).with(c.error),
                Self::file_label(report),
                style(reason).with(c.secondary),
            ));
        }
    }
}

impl Reporter for TerminalReporter {
    fn section(&self, title: &str) {
        self.out(&format!("{}", style(title).with(self.theme.colors.header).bold()));
    }

    fn info(&self, msg: &str) {
        self.out(&format!(
            "{} {msg}",
            style(self.theme.icons.info).with(self.theme.colors.secondary)
        ));
    }

    fn warning(&self, msg: &str) {
        self.err(&format!(
            "{} {msg}",
            style(self.theme.icons.warning).with(self.theme.colors.warning)
        ));
    }

    fn error(&self, msg: &str) {
        self.err(&format!(
            "{} {msg}",
            style("error:").with(self.theme.colors.error).bold()
        ));
    }

    fn release(&self, release: &ReleaseDescriptor, result: &ReleaseResult) {
        let projects = release.projects.join(", ");
        match result {
            ReleaseResult::Created => self.out(&format!(
                "  {} release {} {}",
                style(self.theme.icons.success).with(self.theme.colors.success),
                style(&release.version).with(self.theme.colors.name),
                style(format!("({projects})")).with(self.theme.colors.secondary),
            )),
            other => self.warning(&format!(
                "release {} not confirmed ({other}); uploading anyway",
                release.version
            )),
        }
    }

    fn uploading(&self, target: &UploadTarget) {
        debug!(name = %target.public_name, "upload started");
        if !self.quiet {
            self.out(&self.uploading_line(target));
        }
    }

    fn file_done(&self, report: &FileReport) {
        let c = &self.theme.colors;
        let icons = &self.theme.icons;
        let label = Self::file_label(report);

        match &report.outcome {
            UploadOutcome::Uploaded if !self.quiet => {
                self.out(&format!("  {} {label}", style(icons.success).with(c.success)));
            }
            UploadOutcome::AlreadyExists if !self.quiet => self.out(&format!(
                "  {} {label} {}",
                style(icons.success).with(c.secondary),
                style("(already present)").with(c.secondary),
            )),
            UploadOutcome::Failed { reason } => self.err(&format!(
                "  {} {label} {}",
                style(icons.error).with(c.error),
                style(format!("({reason})")).with(c.error),
            )),
            _ => {}
        }
    }

    fn planned(&self, target: &UploadTarget) {
        self.out(&format!(
            "  {} {} {} {}",
            style(self.theme.icons.pending).with(self.theme.colors.secondary),
            truncate_start(&target.local_path.display().to_string(), PATH_WIDTH),
            style("->").with(self.theme.colors.secondary),
            style(&target.public_name).with(self.theme.colors.name),
        ));
    }

    fn summary(&self, summary: &RunSummary, elapsed_secs: f64) {
        let color = if summary.is_success() {
            self.theme.colors.success
        } else {
            self.theme.colors.error
        };
        self.out(&format!(
            "\n{} {}",
            style(summary.to_string()).with(color).bold(),
            style(format!("in {elapsed_secs:.1}s")).with(self.theme.colors.secondary),
        ));
        self.print_failures(summary);
    }
}
