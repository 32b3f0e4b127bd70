//! Double-checked, lock-guarded population of cache entries.
//!
//! `fetch_or_populate` makes sure that at most one caller transfers a given
//! key at a time, that a caller arriving second sees the finished entry as a
//! cache hit, and that a failed or interrupted population never leaves a
//! partial entry behind.

use std::io::Write;
use std::sync::Arc;
use std::time::SystemTime;

use super::lock::CacheLock;
use super::{CacheBackend, CacheError};
use crate::cache_key::CacheKey;
use crate::error::Result;

/// Siblings tried when a key or its parent collides with an existing entry
/// of the other kind.
const MAX_SIBLING_ATTEMPTS: u32 = 10;

/// Result of [`LockedCacheStore::fetch_or_populate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Final key; differs from the requested one after a directory collision.
    pub key: CacheKey,
    /// When the entry was populated; `None` on a cache hit.
    pub fetched_at: Option<SystemTime>,
}

#[derive(Clone)]
pub struct LockedCacheStore {
    backend: Arc<dyn CacheBackend>,
}

impl LockedCacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        if !backend.supports_locking() {
            tracing::warn!(
                "cache backend has no file locking; it must not be shared between processes"
            );
        }
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    /// Fails unless the backend can exclude writers in other processes.
    pub fn require_locking(&self) -> Result<()> {
        if self.backend.supports_locking() {
            Ok(())
        } else {
            Err(CacheError::LockingUnsupported.into())
        }
    }

    /// Returns the cached entry for `key`, running `populate` into a fresh
    /// entry first if there is none (or if `clean` is set).
    ///
    /// `populate` runs with the key's lock held. If it fails, or panics, the
    /// partial entry is removed and its error is returned unchanged.
    pub fn fetch_or_populate<F>(&self, key: CacheKey, clean: bool, populate: F) -> Result<FetchOutcome>
    where
        F: FnOnce(&mut dyn Write) -> Result<()>,
    {
        let key = if self.backend.exists(key.as_str()) {
            key
        } else {
            let key = self.ensure_parent(key)?;
            self.avoid_directory(key)?
        };

        let _lock = CacheLock::acquire(self.backend.as_ref(), &key)?;

        // Another caller may have populated the entry while we waited.
        if self.backend.exists(key.as_str()) {
            if !clean {
                tracing::debug!(key = %key, "found in cache");
                return Ok(FetchOutcome {
                    key,
                    fetched_at: None,
                });
            }
            match self.backend.remove(key.as_str()) {
                Ok(()) => tracing::debug!(key = %key, "removed cached entry for clean fetch"),
                Err(CacheError::ResourceInvalid(_)) => {
                    tracing::debug!(key = %key, "could not remove cached entry; overwriting")
                }
                Err(e) => return Err(e.into()),
            }
        }

        let mut guard = PartialEntryGuard {
            backend: self.backend.as_ref(),
            key: &key,
            armed: true,
        };
        self.populate_entry(&key, populate)?;
        guard.armed = false;
        drop(guard);

        Ok(FetchOutcome {
            key,
            fetched_at: Some(SystemTime::now()),
        })
    }

    fn populate_entry<F>(&self, key: &CacheKey, populate: F) -> Result<()>
    where
        F: FnOnce(&mut dyn Write) -> Result<()>,
    {
        let mut sink = self.backend.open_write(key.as_str())?;
        populate(&mut *sink)?;
        sink.flush().map_err(|source| CacheError::Io {
            key: key.to_string(),
            source,
        })?;
        Ok(())
    }

    /// Creates the parent directory of `key`. When a plain file sits where a
    /// directory is needed, tries `<parent>0/` .. `<parent>9/` and returns the
    /// first key whose parent could be created.
    fn ensure_parent(&self, key: CacheKey) -> std::result::Result<CacheKey, CacheError> {
        if key.parent().is_empty() {
            return Ok(key);
        }
        let blocked = match self.backend.makedirs(key.parent(), true) {
            Ok(()) => return Ok(key),
            Err(CacheError::DirectoryExpected(at)) => at,
            Err(e) => return Err(e),
        };
        tracing::debug!(key = %key, file = %blocked, "cache directory collides with a file");
        for i in 0..MAX_SIBLING_ATTEMPTS {
            let candidate = key.with_parent_suffix(i);
            match self.backend.makedirs(candidate.parent(), true) {
                Ok(()) => return Ok(candidate),
                Err(CacheError::DirectoryExpected(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(CacheError::DirectoryExpected(blocked))
    }

    /// When `key` itself names a directory, returns the first of `<key>0` ..
    /// `<key>9` that does not.
    fn avoid_directory(&self, key: CacheKey) -> std::result::Result<CacheKey, CacheError> {
        if !self.backend.is_dir(key.as_str()) {
            return Ok(key);
        }
        tracing::debug!(key = %key, "cache entry collides with a directory");
        for i in 0..MAX_SIBLING_ATTEMPTS {
            let candidate = key.with_name_suffix(i);
            if !self.backend.is_dir(candidate.as_str()) {
                return Ok(candidate);
            }
        }
        Err(CacheError::DirectoryExists(key.to_string()))
    }
}

/// Removes the entry on drop unless disarmed, so errors and panics in
/// `populate` both clean up.
struct PartialEntryGuard<'a> {
    backend: &'a dyn CacheBackend,
    key: &'a CacheKey,
    armed: bool,
}

impl Drop for PartialEntryGuard<'_> {
    fn drop(&mut self) {
        if !self.armed || !self.backend.exists(self.key.as_str()) {
            return;
        }
        match self.backend.remove(self.key.as_str()) {
            Ok(()) => tracing::debug!(key = %self.key, "removed partial cache entry"),
            Err(e) => tracing::warn!(key = %self.key, "failed to remove partial cache entry: {}", e),
        }
    }
}
