//! Error taxonomy for URL parsing, cache access and transfers.
//!
//! Only [`Error::Access`] is eligible for the alternate-URL retry in the
//! downloader. Everything else propagates as-is.

use std::fmt;
use std::path::PathBuf;

use crate::cache::CacheError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No URL variant matched, or a DSN name is missing from the supplied mapping.
    #[error("{0}")]
    AppUrl(String),

    /// The remote denied access (HTTP 403, FTP login/permission refusal).
    #[error("access denied for '{url}': {reason}")]
    Access { url: String, reason: String },

    /// Any other transfer failure: network, TLS, non-403 HTTP status, missing strategy.
    #[error("failed to download '{url}': {reason}")]
    Download { url: String, reason: String },

    /// Local `file` resource not found at any candidate location.
    #[error("{0}")]
    LocalFileMissing(LocalFileMissing),

    /// Decode failure reported by a downstream reader of a fetched resource.
    #[error("text encoding error in '{url}': {reason}")]
    TextEncoding { url: String, reason: String },

    /// A `{VAR}` credential placeholder names an unset environment variable.
    #[error("failed to set password from environment variable '{var}' in connection string '{url}'")]
    MissingEnv { var: String, url: String },

    /// The transfer was cancelled through its [`CancelToken`](crate::cancel::CancelToken).
    #[error("download of '{url}' was interrupted")]
    Interrupted { url: String },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl Error {
    pub(crate) fn download(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Error::Download {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn access(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Error::Access {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// True for the access-denied category, the only one the downloader retries.
    pub fn is_access(&self) -> bool {
        matches!(self, Error::Access { .. })
    }

    /// True for failures that belong to the download category.
    pub fn is_download(&self) -> bool {
        matches!(self, Error::Download { .. } | Error::LocalFileMissing(_))
    }
}

/// Details of a failed local-file resolution.
#[derive(Debug, Clone)]
pub struct LocalFileMissing {
    /// Path as written in the URL.
    pub path: String,
    pub working_dir: PathBuf,
    /// Every location tried, in order.
    pub candidates: Vec<PathBuf>,
}

impl fmt::Display for LocalFileMissing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "file resource does not exist. Found none of:")?;
        for candidate in &self.candidates {
            writeln!(f, "  {}", candidate.display())?;
        }
        write!(
            f,
            "working dir = {}, path = {}",
            self.working_dir.display(),
            self.path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_access_is_retryable() {
        assert!(Error::access("http://x/y", "HTTP 403").is_access());
        assert!(!Error::download("http://x/y", "HTTP 404").is_access());
        assert!(!Error::AppUrl("nope".into()).is_access());
    }

    #[test]
    fn local_missing_lists_every_candidate() {
        let err = Error::LocalFileMissing(LocalFileMissing {
            path: "data/a.csv".into(),
            working_dir: PathBuf::from("/work"),
            candidates: vec![
                PathBuf::from("/cwd/data/a.csv"),
                PathBuf::from("/work/data/a.csv"),
            ],
        });
        let msg = err.to_string();
        assert!(msg.contains("/cwd/data/a.csv"));
        assert!(msg.contains("/work/data/a.csv"));
        assert!(msg.contains("working dir = /work"));
        assert!(err.is_download());
    }
}
