//! In-memory cache backend, mainly for tests.
//!
//! It has no filesystem path, so the store cannot lock it and the lock is a
//! no-op. Never share it between processes. Within one process, threads
//! resolving the same key concurrently may each run the transfer. Serialize
//! such callers yourself if that matters.

use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::{CacheBackend, CacheError};

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Arc<Mutex<Vec<u8>>>),
}

#[derive(Debug, Default)]
pub struct MemCache {
    nodes: Mutex<HashMap<String, Node>>,
}

impl MemCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the bytes stored under `key`.
    pub fn contents(&self, key: &str) -> Option<Vec<u8>> {
        match self.nodes.lock().unwrap().get(normalize(key)) {
            Some(Node::File(buf)) => Some(buf.lock().unwrap().clone()),
            _ => None,
        }
    }
}

fn normalize(key: &str) -> &str {
    key.trim_matches('/')
}

fn parent_of(key: &str) -> &str {
    key.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Appends into the shared buffer so partial writes are visible immediately.
struct MemWriter(Arc<Mutex<Vec<u8>>>);

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CacheBackend for MemCache {
    fn exists(&self, key: &str) -> bool {
        matches!(self.nodes.lock().unwrap().get(normalize(key)), Some(Node::File(_)))
    }

    fn is_dir(&self, key: &str) -> bool {
        matches!(self.nodes.lock().unwrap().get(normalize(key)), Some(Node::Dir))
    }

    fn open_write(&self, key: &str) -> Result<Box<dyn Write + Send>, CacheError> {
        let key = normalize(key);
        let mut nodes = self.nodes.lock().unwrap();
        let parent = parent_of(key);
        if !parent.is_empty() && !matches!(nodes.get(parent), Some(Node::Dir)) {
            return Err(CacheError::Io {
                key: key.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "parent directory missing"),
            });
        }
        if matches!(nodes.get(key), Some(Node::Dir)) {
            return Err(CacheError::ResourceInvalid(key.to_string()));
        }
        let buf = Arc::new(Mutex::new(Vec::new()));
        nodes.insert(key.to_string(), Node::File(Arc::clone(&buf)));
        Ok(Box::new(MemWriter(buf)))
    }

    fn open_read(&self, key: &str) -> Result<Box<dyn Read + Send>, CacheError> {
        self.contents(key)
            .map(|bytes| Box::new(Cursor::new(bytes)) as Box<dyn Read + Send>)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    fn makedirs(&self, dir: &str, recreate: bool) -> Result<(), CacheError> {
        let dir = normalize(dir);
        let mut nodes = self.nodes.lock().unwrap();
        if matches!(nodes.get(dir), Some(Node::Dir)) && !recreate {
            return Err(CacheError::DirectoryExists(dir.to_string()));
        }
        let mut prefix = String::new();
        for component in dir.split('/').filter(|c| !c.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(component);
            match nodes.get(prefix.as_str()) {
                Some(Node::File(_)) => return Err(CacheError::DirectoryExpected(prefix)),
                Some(Node::Dir) => {}
                None => {
                    nodes.insert(prefix.clone(), Node::Dir);
                }
            }
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let key = normalize(key);
        let mut nodes = self.nodes.lock().unwrap();
        match nodes.get(key) {
            Some(Node::File(_)) => {
                nodes.remove(key);
                Ok(())
            }
            Some(Node::Dir) => Err(CacheError::ResourceInvalid(key.to_string())),
            None => Err(CacheError::NotFound(key.to_string())),
        }
    }

    fn sys_path(&self, _key: &str) -> Option<PathBuf> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_writes_visible() {
        let cache = MemCache::new();
        cache.makedirs("a/b", true).unwrap();
        let mut w = cache.open_write("a/b/c").unwrap();
        w.write_all(b"par").unwrap();
        assert!(cache.exists("a/b/c"));
        assert_eq!(cache.contents("a/b/c").unwrap(), b"par");
    }

    #[test]
    fn directories_are_not_entries() {
        let cache = MemCache::new();
        cache.makedirs("a/b", true).unwrap();
        assert!(!cache.exists("a"));
        assert!(!cache.exists("a/b"));
        assert!(cache.is_dir("a/b"));
        cache.open_write("a/b/c").unwrap();
        assert!(cache.exists("a/b/c"));
        assert!(!cache.is_dir("a/b/c"));
    }

    #[test]
    fn file_blocks_directory() {
        let cache = MemCache::new();
        cache.makedirs("a", true).unwrap();
        cache.open_write("a/b").unwrap();
        assert!(matches!(
            cache.makedirs("a/b/c", true),
            Err(CacheError::DirectoryExpected(p)) if p == "a/b"
        ));
    }

    #[test]
    fn write_requires_parent_and_no_syspath() {
        let cache = MemCache::new();
        assert!(cache.open_write("missing/f").is_err());
        assert!(cache.open_write("top-level").is_ok());
        assert!(cache.sys_path("top-level").is_none());
        assert!(!cache.supports_locking());
    }
}
