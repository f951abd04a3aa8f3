//! Data model of a publish run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Identifies the package artifact to fetch from the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    /// Package name as published (e.g. `sales-ui` or `@acme/sales-ui`).
    pub name: String,

    /// Exact version (e.g. `0.3.6`) or a dist-tag (e.g. `latest`).
    pub version: String,
}

/// Errors that can occur when building a [`PackageRef`].
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PackageRefError {
    /// A required field (name or version) is empty.
    #[error("Empty field: {0}")]
    EmptyField(&'static str),

    /// The name contains characters a registry would never accept.
    #[error("Invalid package name: {0}")]
    InvalidName(String),
}

impl PackageRef {
    /// Build a package reference, validating both fields.
    ///
    /// # Errors
    ///
    /// Returns [`PackageRefError::EmptyField`] if either field is blank, or
    /// [`PackageRefError::InvalidName`] if the name contains whitespace or a
    /// scope without a package part.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, PackageRefError> {
        let name = name.into().trim().to_string();
        let version = version.into().trim().to_string();

        if name.is_empty() {
            return Err(PackageRefError::EmptyField("name"));
        }
        if version.is_empty() {
            return Err(PackageRefError::EmptyField("version"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(PackageRefError::InvalidName(name));
        }
        if let Some(scoped) = name.strip_prefix('@') {
            match scoped.split_once('/') {
                Some((scope, pkg)) if !scope.is_empty() && !pkg.is_empty() => {}
                _ => return Err(PackageRefError::InvalidName(name)),
            }
        }

        Ok(Self { name, version })
    }

    /// Path segment for the registry metadata document.
    ///
    /// Scoped names keep their `@` but encode the separating slash, which is
    /// what npm-compatible registries expect.
    ///
    /// ```
    /// use sourcemaps_schema::PackageRef;
    ///
    /// let pkg = PackageRef::new("@acme/ui", "1.0.0").unwrap();
    /// assert_eq!(pkg.registry_path(), "@acme%2fui");
    /// ```
    pub fn registry_path(&self) -> String {
        self.name.replace('/', "%2f")
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Release registered with the tracking service before any file is uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDescriptor {
    /// Release identifier (the package version).
    pub version: String,

    /// Projects the release belongs to. Sorted and deduplicated.
    pub projects: Vec<String>,
}

impl ReleaseDescriptor {
    /// Build a descriptor, dropping duplicate and blank project names.
    pub fn new(version: impl Into<String>, projects: impl IntoIterator<Item = String>) -> Self {
        let projects: BTreeSet<String> = projects
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        Self {
            version: version.into(),
            projects: projects.into_iter().collect(),
        }
    }
}

/// A local file paired with the public URL it is served under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTarget {
    /// Absolute path of the file inside the extracted package.
    pub local_path: PathBuf,

    /// URL the deployed application serves this file from.
    pub public_name: String,
}

/// Outcome of registering the release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReleaseResult {
    /// The service answered 2xx: the release exists now.
    Created,

    /// The service answered with a non-2xx status.
    Rejected {
        /// HTTP status code.
        code: u16,
        /// Response body, kept for diagnostics.
        body: String,
    },

    /// The service could not be reached at all.
    Unreachable {
        /// Transport error description.
        reason: String,
    },
}

impl ReleaseResult {
    /// Returns `true` if the release is known to exist.
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created)
    }
}

impl fmt::Display for ReleaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Rejected { code, body } => write!(f, "rejected with HTTP {code}: {body}"),
            Self::Unreachable { reason } => write!(f, "registrar unreachable: {reason}"),
        }
    }
}

/// Why a single file could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The file's path could not be mapped to a public name.
    Config {
        /// Mapping error description.
        message: String,
    },

    /// The tracking service refused the upload.
    Rejected {
        /// HTTP status code.
        code: u16,
        /// Response body, kept for diagnostics.
        body: String,
    },

    /// The request never completed (DNS, connect, timeout).
    Transport {
        /// Transport error description.
        message: String,
    },

    /// The local file could not be read.
    Io {
        /// I/O error description.
        message: String,
    },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message } => write!(f, "config-error: {message}"),
            Self::Rejected { code, body } if body.is_empty() => write!(f, "HTTP {code}"),
            Self::Rejected { code, body } => write!(f, "HTTP {code}: {body}"),
            Self::Transport { message } => write!(f, "transport error: {message}"),
            Self::Io { message } => write!(f, "io error: {message}"),
        }
    }
}

/// Result of delivering one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadOutcome {
    /// The service stored the file (HTTP 200/201).
    Uploaded,

    /// The service already had a file under this name (HTTP 409).
    AlreadyExists,

    /// The file was not delivered.
    Failed {
        /// What went wrong.
        reason: FailureReason,
    },
}

impl UploadOutcome {
    /// Shorthand for a failed outcome.
    pub fn failed(reason: FailureReason) -> Self {
        Self::Failed { reason }
    }

    /// Returns `true` for `Uploaded` and `AlreadyExists`.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Short human label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::AlreadyExists => "already exists",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Per-file entry of a [`RunSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    /// File inside the extracted package.
    pub local_path: PathBuf,

    /// Public name, when the path could be mapped.
    pub public_name: Option<String>,

    /// What happened to the file.
    #[serde(flatten)]
    pub outcome: UploadOutcome,
}

/// Aggregated result of one orchestration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Outcome of release registration, if it was attempted.
    pub release: Option<ReleaseResult>,

    /// One report per discovered file, ordered by local path.
    pub files: Vec<FileReport>,
}

impl RunSummary {
    /// Build a summary; reports are sorted by path so the result does not
    /// depend on the order uploads completed in.
    pub fn new(release: Option<ReleaseResult>, mut files: Vec<FileReport>) -> Self {
        files.sort_by(|a, b| a.local_path.cmp(&b.local_path));
        Self { release, files }
    }

    /// Number of files stored by this run.
    pub fn uploaded(&self) -> usize {
        self.count(|o| matches!(o, UploadOutcome::Uploaded))
    }

    /// Number of files the service already had.
    pub fn already_exists(&self) -> usize {
        self.count(|o| matches!(o, UploadOutcome::AlreadyExists))
    }

    /// Number of files that were not delivered.
    pub fn failed(&self) -> usize {
        self.count(|o| !o.is_success())
    }

    /// Reports for files that were not delivered.
    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|r| !r.outcome.is_success())
    }

    /// Returns `true` if no file failed. An empty run is a success.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&UploadOutcome) -> bool) -> usize {
        self.files.iter().filter(|r| pred(&r.outcome)).count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} uploaded, {} already present, {} failed",
            self.uploaded(),
            self.already_exists(),
            self.failed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(path: &str, outcome: UploadOutcome) -> FileReport {
        FileReport {
            local_path: PathBuf::from(path),
            public_name: None,
            outcome,
        }
    }

    #[test]
    fn test_package_ref_validation() {
        assert!(PackageRef::new("sales-ui", "0.3.6").is_ok());
        assert!(PackageRef::new("@acme/sales-ui", "latest").is_ok());
        assert_eq!(
            PackageRef::new("", "1.0.0"),
            Err(PackageRefError::EmptyField("name"))
        );
        assert_eq!(
            PackageRef::new("pkg", "  "),
            Err(PackageRefError::EmptyField("version"))
        );
        assert!(matches!(
            PackageRef::new("@acme", "1.0.0"),
            Err(PackageRefError::InvalidName(_))
        ));
        assert!(matches!(
            PackageRef::new("bad name", "1.0.0"),
            Err(PackageRefError::InvalidName(_))
        ));
    }

    #[test]
    fn test_display() {
        let pkg = PackageRef::new("pkg", "2.67.0").unwrap();
        assert_eq!(pkg.to_string(), "pkg@2.67.0");
    }

    #[test]
    fn test_release_descriptor_dedups_projects() {
        let release = ReleaseDescriptor::new(
            "1.0.0",
            vec!["web".to_string(), "api".to_string(), "web".to_string(), " ".to_string()],
        );
        assert_eq!(release.projects, vec!["api", "web"]);

        let json = serde_json::to_value(&release).unwrap();
        assert_eq!(json["version"], "1.0.0");
        assert_eq!(json["projects"][1], "web");
    }

    #[test]
    fn test_summary_counts_and_order() {
        let summary = RunSummary::new(
            Some(ReleaseResult::Created),
            vec![
                report("/x/c.map", UploadOutcome::Uploaded),
                report(
                    "/x/a.map",
                    UploadOutcome::failed(FailureReason::Rejected {
                        code: 500,
                        body: "boom".to_string(),
                    }),
                ),
                report("/x/b.map", UploadOutcome::AlreadyExists),
            ],
        );

        assert_eq!(summary.uploaded(), 1);
        assert_eq!(summary.already_exists(), 1);
        assert_eq!(summary.failed(), 1);
        assert!(!summary.is_success());
        assert_eq!(summary.files[0].local_path, PathBuf::from("/x/a.map"));
        assert_eq!(summary.failures().count(), 1);
        assert_eq!(
            summary.to_string(),
            "1 uploaded, 1 already present, 1 failed"
        );
    }

    #[test]
    fn test_empty_summary_is_success() {
        let summary = RunSummary::default();
        assert!(summary.is_success());
        assert_eq!(summary.files.len(), 0);
    }

    #[test]
    fn test_failure_reason_display() {
        let reason = FailureReason::Config {
            message: "prefix 'dist' not found".to_string(),
        };
        assert_eq!(reason.to_string(), "config-error: prefix 'dist' not found");

        let reason = FailureReason::Rejected {
            code: 502,
            body: String::new(),
        };
        assert_eq!(reason.to_string(), "HTTP 502");
    }
}
