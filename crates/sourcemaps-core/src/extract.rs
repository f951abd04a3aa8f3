//! Archive extraction module
//!
//! Unpacks gzip-compressed tarballs as published by npm-compatible registries.
//! Package contents normally live under a top-level `package/` directory.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

/// Directory npm places package contents under inside the tarball.
pub const PACKAGE_DIR: &str = "package";

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive error: {0}")]
    Archive(String),
}

/// A package unpacked on local storage.
#[derive(Debug, Clone)]
pub struct ExtractedTree {
    /// Extraction directory. Public names are computed relative to it.
    pub root: PathBuf,
    /// Directory holding the package contents (usually `<root>/package`).
    pub package_dir: PathBuf,
    /// Number of regular files written.
    pub file_count: usize,
}

impl ExtractedTree {
    /// Wrap an already-extracted directory.
    ///
    /// Uses `<root>/package` when present, otherwise the single top-level
    /// directory, otherwise `root` itself.
    pub fn from_dir(root: &Path) -> io::Result<Self> {
        let package_dir = detect_package_dir(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            package_dir,
            file_count: 0,
        })
    }
}

/// Extract a tar.gz archive to a destination directory
pub fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<ExtractedTree, ExtractError> {
    let file = File::open(archive_path)?;
    let reader = BufReader::new(file);
    let gz_decoder = flate2::read::GzDecoder::new(reader);

    let file_count = extract_tar(gz_decoder, dest_dir)?;
    let package_dir = detect_package_dir(dest_dir)?;
    debug!(
        files = file_count,
        package_dir = %package_dir.display(),
        "package extracted"
    );

    Ok(ExtractedTree {
        root: dest_dir.to_path_buf(),
        package_dir,
        file_count,
    })
}

/// Async wrapper running [`extract_tar_gz`] on the blocking pool.
pub async fn extract_tar_gz_async(
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<ExtractedTree, ExtractError> {
    let archive_path = archive_path.to_path_buf();
    let dest_dir = dest_dir.to_path_buf();
    tokio::task::spawn_blocking(move || extract_tar_gz(&archive_path, &dest_dir))
        .await
        .map_err(io::Error::other)?
}

/// Extract a tar archive from a reader
fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<usize, ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    let mut count = 0;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_type = entry.header().entry_type();

        if entry_type.is_dir() {
            continue;
        }
        // npm tarballs only carry regular files; links could point outside dest.
        if !entry_type.is_file() {
            debug!(path = %entry.path()?.display(), "skipping non-regular entry");
            continue;
        }

        let relative_path = sanitize(&entry.path()?)?;
        let absolute_path = dest_dir.join(&relative_path);

        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&absolute_path)?;
        count += 1;
    }

    Ok(count)
}

/// Reject absolute paths and `..` so entries cannot escape the destination.
fn sanitize(path: &Path) -> Result<PathBuf, ExtractError> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ExtractError::Archive(format!(
                    "Invalid path in archive: {}",
                    path.display()
                )));
            }
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(ExtractError::Archive("Empty path in archive".to_string()));
    }
    Ok(clean)
}

fn detect_package_dir(root: &Path) -> io::Result<PathBuf> {
    let conventional = root.join(PACKAGE_DIR);
    if conventional.is_dir() {
        return Ok(conventional);
    }

    let mut dirs = Vec::new();
    let mut has_files = false;
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        } else {
            has_files = true;
        }
    }

    if dirs.len() == 1 && !has_files {
        let dir = dirs.remove(0);
        warn!(dir = %dir.display(), "archive has no 'package/' directory, using its only top-level directory");
        return Ok(dir);
    }

    warn!(root = %root.display(), "archive has no 'package/' directory, using the extraction root");
    Ok(root.to_path_buf())
}
