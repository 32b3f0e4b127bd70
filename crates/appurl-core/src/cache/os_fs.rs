//! Cache backend rooted in a local directory.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use super::{CacheBackend, CacheError};

/// Directory-backed cache. Keys are relative paths below `root`.
#[derive(Debug, Clone)]
pub struct OsCache {
    root: PathBuf,
}

impl OsCache {
    /// Opens (creating if needed) a cache rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| CacheError::Io {
            key: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> PathBuf {
        self.root.join(key.trim_start_matches('/'))
    }
}

fn io_err(key: &str) -> impl FnOnce(io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        key: key.to_string(),
        source,
    }
}

impl CacheBackend for OsCache {
    fn exists(&self, key: &str) -> bool {
        self.path_of(key).is_file()
    }

    fn is_dir(&self, key: &str) -> bool {
        self.path_of(key).is_dir()
    }

    fn open_write(&self, key: &str) -> Result<Box<dyn Write + Send>, CacheError> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.path_of(key))
            .map_err(io_err(key))?;
        Ok(Box::new(file))
    }

    fn open_read(&self, key: &str) -> Result<Box<dyn Read + Send>, CacheError> {
        match File::open(self.path_of(key)) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(CacheError::NotFound(key.to_string()))
            }
            Err(e) => Err(io_err(key)(e)),
        }
    }

    fn makedirs(&self, dir: &str, recreate: bool) -> Result<(), CacheError> {
        let target = self.path_of(dir);
        if target.is_dir() {
            return if recreate {
                Ok(())
            } else {
                Err(CacheError::DirectoryExists(dir.to_string()))
            };
        }
        // Walk down so a plain file anywhere on the way is reported by name.
        let mut prefix = String::new();
        for component in dir.split('/').filter(|c| !c.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(component);
            let path = self.path_of(&prefix);
            if path.is_file() {
                return Err(CacheError::DirectoryExpected(prefix));
            }
        }
        fs::create_dir_all(&target).map_err(io_err(dir))
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let path = self.path_of(key);
        if path.is_dir() {
            return Err(CacheError::ResourceInvalid(key.to_string()));
        }
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(CacheError::NotFound(key.to_string()))
            }
            Err(e) => Err(io_err(key)(e)),
        }
    }

    fn sys_path(&self, key: &str) -> Option<PathBuf> {
        Some(self.path_of(key))
    }

    fn supports_locking(&self) -> bool {
        cfg!(unix)
    }
}
