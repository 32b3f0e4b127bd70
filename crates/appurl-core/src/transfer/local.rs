//! Resolution of `file` URLs to absolute paths. Nothing is copied.

use std::path::{Path, PathBuf};

use crate::error::{Error, LocalFileMissing, Result};

fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Locations tried for `path`, in order: as given, with the leading `/`
/// stripped, then both forms under `working_dir`.
pub fn candidate_paths(path: &str, working_dir: &Path) -> Vec<PathBuf> {
    let stripped = path.trim_start_matches('/');
    vec![
        absolutize(Path::new(path)),
        absolutize(Path::new(stripped)),
        absolutize(&working_dir.join(path)),
        absolutize(&working_dir.join(stripped)),
    ]
}

/// First existing candidate for `path`, or a [`LocalFileMissing`] error
/// listing every location tried.
pub fn resolve_local(path: &str, working_dir: &Path) -> Result<PathBuf> {
    let candidates = candidate_paths(path, working_dir);
    if let Some(found) = candidates.iter().find(|c| c.exists()) {
        tracing::debug!(path, found = %found.display(), "resolved local file");
        return Ok(found.clone());
    }
    Err(Error::LocalFileMissing(LocalFileMissing {
        path: path.to_string(),
        working_dir: working_dir.to_path_buf(),
        candidates,
    }))
}
