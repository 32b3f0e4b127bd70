//! Per-key advisory locks.
//!
//! On a backend with a real filesystem path the lock is `flock(2)` on a
//! `<key>.lock` file, which excludes other processes and other threads
//! (each acquisition opens its own file description). Other backends get a
//! no-op lock. The lock is released when the guard drops.

use std::fs::File;
use std::path::{Path, PathBuf};

use super::{CacheBackend, CacheError};
use crate::cache_key::CacheKey;

/// Held for the duration of one fetch-or-populate attempt.
#[derive(Debug)]
pub enum CacheLock {
    File(FileLock),
    NoOp,
}

impl CacheLock {
    /// Blocks until the exclusive lock for `key` is held.
    pub fn acquire(backend: &dyn CacheBackend, key: &CacheKey) -> Result<Self, CacheError> {
        if !backend.supports_locking() {
            return Ok(CacheLock::NoOp);
        }
        match backend.sys_path(&key.lock_key()) {
            Some(path) => FileLock::acquire(&path).map(CacheLock::File),
            None => Ok(CacheLock::NoOp),
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, CacheLock::NoOp)
    }
}

#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    #[cfg(unix)]
    fn acquire(path: &Path) -> Result<Self, CacheError> {
        use std::os::unix::io::AsRawFd;

        let io_err = |source| CacheError::Io {
            key: path.display().to_string(),
            source,
        };
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(io_err)?;
        loop {
            let r = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if r == 0 {
                break;
            }
            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::Interrupted {
                return Err(io_err(err));
            }
        }
        tracing::trace!(lock = %path.display(), "acquired cache lock");
        Ok(FileLock {
            file,
            path: path.to_path_buf(),
        })
    }

    #[cfg(not(unix))]
    fn acquire(path: &Path) -> Result<Self, CacheError> {
        Err(CacheError::Io {
            key: path.display().to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "file locking is only implemented on unix",
            ),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            let r = unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) };
            if r != 0 {
                tracing::debug!(lock = %self.path.display(), "flock unlock failed; closing releases it");
            }
        }
    }
}
