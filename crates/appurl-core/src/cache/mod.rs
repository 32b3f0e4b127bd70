//! Cache backends and the lock-guarded store built on them.
//!
//! A backend is a filesystem-like key space addressed by `/`-separated
//! relative paths. [`OsCache`] is rooted in a real directory and supports
//! cross-process locking; [`MemCache`] lives in memory and is single-process
//! only.

mod lock;
mod memory;
mod os_fs;
mod store;

pub use lock::CacheLock;
pub use memory::MemCache;
pub use os_fs::OsCache;
pub use store::{FetchOutcome, LockedCacheStore};

use std::io::{Read, Write};
use std::path::PathBuf;

/// Failures reported by a [`CacheBackend`].
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A path component that must be a directory is a plain file.
    #[error("expected a directory at '{0}' but found a file")]
    DirectoryExpected(String),

    #[error("directory '{0}' already exists")]
    DirectoryExists(String),

    #[error("cache entry '{0}' not found")]
    NotFound(String),

    /// The entry cannot be removed (busy, or not a file).
    #[error("cache entry '{0}' is busy or invalid")]
    ResourceInvalid(String),

    /// The backend cannot exclude concurrent writers in other processes.
    #[error("cache backend does not support cross-process locking")]
    LockingUnsupported,

    #[error("cache I/O on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Filesystem-like storage for cached artifacts.
///
/// Implementations must be safe to share between threads. Whether concurrent
/// writers in *different processes* are safe is signalled by
/// [`supports_locking`](Self::supports_locking).
pub trait CacheBackend: Send + Sync {
    /// True when `key` is a file entry. Directories do not count.
    fn exists(&self, key: &str) -> bool;

    fn is_dir(&self, key: &str) -> bool;

    /// Opens `key` for writing, truncating any previous content.
    fn open_write(&self, key: &str) -> Result<Box<dyn Write + Send>, CacheError>;

    fn open_read(&self, key: &str) -> Result<Box<dyn Read + Send>, CacheError>;

    /// Creates `dir` and its parents. With `recreate == false` an existing
    /// directory is an error.
    fn makedirs(&self, dir: &str, recreate: bool) -> Result<(), CacheError>;

    fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Absolute filesystem path of `key`, when the backend has one.
    fn sys_path(&self, key: &str) -> Option<PathBuf>;

    /// True when [`sys_path`](Self::sys_path) points at a real filesystem
    /// where advisory file locks exclude other processes.
    fn supports_locking(&self) -> bool {
        false
    }
}
