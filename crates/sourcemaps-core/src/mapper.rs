//! Path mapping: local file inside an extracted package -> public URL.
//!
//! Pure string work, no filesystem access. Paths are compared component-wise
//! against the root and then rendered with `/` separators on every platform,
//! so the same tree always yields the same names.

use std::path::{Component, Path, PathBuf};

use sourcemaps_schema::UploadTarget;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("{} is not inside {}", path.display(), root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("strip prefix '{prefix}' not found in '{relative}'")]
    PrefixNotFound { prefix: String, relative: String },

    #[error("nothing left of '{relative}' after stripping '{prefix}'")]
    EmptyRemainder { prefix: String, relative: String },
}

/// Compute the public URL of `local_path`.
///
/// `local_path` is made relative to `root`, everything up to and including the
/// first occurrence of `strip_prefix` is dropped, surrounding slashes are
/// trimmed and the remainder is appended to `app_url`.
///
/// ```
/// use std::path::Path;
/// use sourcemaps_core::mapper::public_name;
///
/// let name = public_name(
///     Path::new("/tmp/x/package/dist/libraries/js/foo.map"),
///     Path::new("/tmp/x"),
///     "dist",
///     "https://fantastic.app/js",
/// )
/// .unwrap();
/// assert_eq!(name, "https://fantastic.app/js/libraries/js/foo.map");
/// ```
///
/// # Errors
///
/// Fails if the path is not under `root`, if `strip_prefix` does not occur in
/// the relative path, or if nothing remains after it. A missing prefix is a
/// configuration error: uploading under a guessed name would silently break
/// de-minification.
pub fn public_name(
    local_path: &Path,
    root: &Path,
    strip_prefix: &str,
    app_url: &str,
) -> Result<String, MappingError> {
    let relative = local_path
        .strip_prefix(root)
        .map_err(|_| MappingError::OutsideRoot {
            path: local_path.to_path_buf(),
            root: root.to_path_buf(),
        })?;
    let relative = to_slash(relative);

    let Some((_, rest)) = relative.split_once(strip_prefix) else {
        return Err(MappingError::PrefixNotFound {
            prefix: strip_prefix.to_string(),
            relative,
        });
    };

    // First occurrence wins. Nested directories that repeat the prefix are
    // kept in the name, which is usually not what the user meant.
    if !strip_prefix.is_empty() && relative.matches(strip_prefix).count() > 1 {
        warn!(
            prefix = strip_prefix,
            path = %relative,
            "strip prefix occurs more than once, using the first occurrence"
        );
    }

    let rest = rest.trim_matches('/');
    if rest.is_empty() {
        return Err(MappingError::EmptyRemainder {
            prefix: strip_prefix.to_string(),
            relative,
        });
    }

    Ok(format!("{}/{rest}", app_url.trim_end_matches('/')))
}

/// Render a relative path with `/` separators, dropping `.` components.
fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Mapping parameters bound together for repeated use over one tree.
#[derive(Debug, Clone)]
pub struct PathMapper {
    root: PathBuf,
    strip_prefix: String,
    app_url: String,
}

impl PathMapper {
    pub fn new(
        root: impl Into<PathBuf>,
        strip_prefix: impl Into<String>,
        app_url: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            strip_prefix: strip_prefix.into(),
            app_url: app_url.into(),
        }
    }

    /// Map one file to its upload target.
    pub fn map(&self, local_path: &Path) -> Result<UploadTarget, MappingError> {
        let public_name = public_name(local_path, &self.root, &self.strip_prefix, &self.app_url)?;
        Ok(UploadTarget {
            local_path: local_path.to_path_buf(),
            public_name,
        })
    }
}
