//! Cache key derivation: URL to hierarchical cache-relative path.
//!
//! Keys mirror `host/path` so the cache stays browsable. A query string is
//! hashed (SHA-224) into an extra directory just before the final path
//! component, keeping the file name (and its extension) intact.

use std::fmt;

use sha2::{Digest, Sha224};

use crate::error::{Error, Result};

/// Relative, `/`-separated path of a cached artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parent directory (`""` for a top-level key).
    pub fn parent(&self) -> &str {
        self.0.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }

    /// Final component.
    pub fn file_name(&self) -> &str {
        self.0.rsplit_once('/').map(|(_, name)| name).unwrap_or(&self.0)
    }

    /// Sibling path with the parent directory renamed to `<parent><suffix>`.
    pub(crate) fn with_parent_suffix(&self, suffix: u32) -> CacheKey {
        CacheKey(format!("{}{}/{}", self.parent(), suffix, self.file_name()))
    }

    /// Sibling path with the final component renamed to `<name><suffix>`.
    pub(crate) fn with_name_suffix(&self, suffix: u32) -> CacheKey {
        CacheKey(format!("{}{}", self.0, suffix))
    }

    /// Path of the advisory lock file guarding this key.
    pub fn lock_key(&self) -> String {
        format!("{}.lock", self.0)
    }

    #[cfg(test)]
    pub(crate) fn from_raw(s: &str) -> CacheKey {
        CacheKey(s.to_string())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derives the cache key for a transport URL (no fragment).
///
/// `.` and `..` segments are dropped so a key never escapes the cache root.
/// Empty segments are dropped too: a filesystem cannot tell `a//b` from
/// `a/b`, so `http://h/a//b` and `http://h/a/b` share one entry.
pub fn derive_key(resource_url: &str) -> Result<CacheKey> {
    let normalized = resource_url.replace('\\', "/");
    let parsed = url::Url::parse(&normalized)
        .map_err(|e| Error::AppUrl(format!("cannot derive cache key for '{}': {}", resource_url, e)))?;

    let host = parsed.host_str().unwrap_or("");
    let mut segments: Vec<String> = Vec::new();
    if !host.is_empty() {
        segments.push(match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        });
    }
    segments.extend(
        parsed
            .path()
            .split('/')
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
            .map(str::to_string),
    );

    if segments.is_empty() {
        return Err(Error::AppUrl(format!(
            "cannot derive cache key for '{}': no host or path",
            resource_url
        )));
    }

    if let Some(query) = parsed.query().filter(|q| !q.is_empty()) {
        let digest = hex::encode(Sha224::digest(query.as_bytes()));
        let at = segments.len() - 1;
        segments.insert(at, digest);
    }

    Ok(CacheKey(segments.join("/")))
}
