//! Registry documents.
//!
//! Only the subset of the npm "packument" the tool relies on is modelled:
//! the per-version `dist` block and the `dist-tags` table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata document served at `<registry>/<package>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Packument {
    /// Package name, when the registry includes it.
    #[serde(default)]
    pub name: Option<String>,

    /// Published versions keyed by version string.
    #[serde(default)]
    pub versions: BTreeMap<String, VersionManifest>,

    /// Named tags (`latest`, `next`, ...) pointing at versions.
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: BTreeMap<String, String>,
}

/// Manifest of one published version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionManifest {
    /// Version string, when the registry includes it.
    #[serde(default)]
    pub version: Option<String>,

    /// Where the tarball lives and how to verify it.
    pub dist: Dist,
}

/// Download location and checksums of a version's tarball.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dist {
    /// Absolute URL of the tarball.
    pub tarball: String,

    /// Subresource-integrity string (`sha512-<base64>`).
    #[serde(default)]
    pub integrity: Option<String>,
}

/// Errors resolving a requested version inside a [`Packument`].
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ResolveError {
    /// No published version (or tag) matches the request.
    #[error("version '{0}' not found in registry metadata")]
    VersionNotFound(String),

    /// A dist-tag points at a version that is not listed.
    #[error("dist-tag '{tag}' points to unknown version '{version}'")]
    DanglingTag {
        /// Requested tag.
        tag: String,
        /// Version the tag points at.
        version: String,
    },
}

impl Packument {
    /// Resolve a version string or dist-tag to its concrete version and `dist` block.
    ///
    /// A request that parses as semver is only looked up in `versions`; anything
    /// else is treated as a dist-tag.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::VersionNotFound`] if neither a version nor a tag
    /// matches, or [`ResolveError::DanglingTag`] if the tag points nowhere.
    pub fn resolve(&self, requested: &str) -> Result<(&str, &Dist), ResolveError> {
        if semver::Version::parse(requested).is_ok() {
            return self
                .versions
                .get_key_value(requested)
                .map(|(version, manifest)| (version.as_str(), &manifest.dist))
                .ok_or_else(|| ResolveError::VersionNotFound(requested.to_string()));
        }

        let target = self
            .dist_tags
            .get(requested)
            .ok_or_else(|| ResolveError::VersionNotFound(requested.to_string()))?;

        self.versions
            .get_key_value(target)
            .map(|(version, manifest)| (version.as_str(), &manifest.dist))
            .ok_or_else(|| ResolveError::DanglingTag {
                tag: requested.to_string(),
                version: target.clone(),
            })
    }
}

/// One hash entry of a subresource-integrity string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Integrity {
    /// Hash algorithm (e.g. `sha512`).
    pub algorithm: String,

    /// Base64-encoded digest.
    pub digest: String,
}

impl Integrity {
    /// Parse an SRI string, preferring the strongest supported entry.
    ///
    /// SRI strings may carry several space-separated `<algo>-<digest>` entries;
    /// `sha512` wins over anything else. Returns `None` for empty or malformed
    /// input.
    ///
    /// ```
    /// use sourcemaps_schema::Integrity;
    ///
    /// let sri = Integrity::parse("sha1-abc sha512-def").unwrap();
    /// assert_eq!(sri.algorithm, "sha512");
    /// assert_eq!(sri.digest, "def");
    /// ```
    pub fn parse(sri: &str) -> Option<Self> {
        let entries: Vec<Self> = sri
            .split_whitespace()
            .filter_map(|entry| {
                let (algorithm, digest) = entry.split_once('-')?;
                // Options after '?' are allowed by the SRI grammar but unused here.
                let digest = digest.split('?').next().unwrap_or(digest);
                if algorithm.is_empty() || digest.is_empty() {
                    return None;
                }
                Some(Self {
                    algorithm: algorithm.to_ascii_lowercase(),
                    digest: digest.to_string(),
                })
            })
            .collect();

        entries
            .iter()
            .find(|e| e.algorithm == "sha512")
            .or_else(|| entries.first())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKUMENT: &str = r#"{
        "name": "request",
        "dist-tags": { "latest": "2.67.0", "broken": "9.9.9", "1.0.0": "2.67.0" },
        "versions": {
            "2.67.0": {
                "name": "request",
                "version": "2.67.0",
                "dist": {
                    "tarball": "http://foo.bar/request/-/request-2.67.0.tgz"
                }
            }
        }
    }"#;

    #[test]
    fn test_resolve_exact_version() {
        let doc: Packument = serde_json::from_str(PACKUMENT).unwrap();
        let (version, dist) = doc.resolve("2.67.0").unwrap();
        assert_eq!(version, "2.67.0");
        assert_eq!(dist.tarball, "http://foo.bar/request/-/request-2.67.0.tgz");
        assert!(dist.integrity.is_none());
    }

    #[test]
    fn test_resolve_dist_tag() {
        let doc: Packument = serde_json::from_str(PACKUMENT).unwrap();
        let (version, _) = doc.resolve("latest").unwrap();
        assert_eq!(version, "2.67.0");
    }

    #[test]
    fn test_semver_request_ignores_tags() {
        // A tag that looks like a version never shadows the versions table.
        let doc: Packument = serde_json::from_str(PACKUMENT).unwrap();
        assert_eq!(
            doc.resolve("1.0.0").unwrap_err(),
            ResolveError::VersionNotFound("1.0.0".to_string())
        );
    }

    #[test]
    fn test_resolve_errors() {
        let doc: Packument = serde_json::from_str(PACKUMENT).unwrap();
        assert_eq!(
            doc.resolve("nightly").unwrap_err(),
            ResolveError::VersionNotFound("nightly".to_string())
        );
        assert!(matches!(
            doc.resolve("broken").unwrap_err(),
            ResolveError::DanglingTag { .. }
        ));
    }

    #[test]
    fn test_integrity_parse() {
        assert_eq!(Integrity::parse(""), None);
        assert_eq!(Integrity::parse("garbage"), None);

        let sri = Integrity::parse("sha256-aGVsbG8=").unwrap();
        assert_eq!(sri.algorithm, "sha256");
        assert_eq!(sri.digest, "aGVsbG8=");

        let sri = Integrity::parse("sha512-Zm9v?opt sha1-YmFy").unwrap();
        assert_eq!(sri.digest, "Zm9v");
    }
}
