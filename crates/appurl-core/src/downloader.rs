//! Resolve a [`Url`] to a local file, downloading into the cache if needed.
//!
//! `file` URLs are located on disk and never copied. Everything else goes
//! through [`LockedCacheStore::fetch_or_populate`] keyed on the URL's
//! resource address, so concurrent callers for the same resource share one
//! transfer. An access-denied failure is retried once with the variant's
//! alternate (credentialed) address when it has one.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::cache::{CacheBackend, LockedCacheStore, OsCache};
use crate::cache_key::{derive_key, CacheKey};
use crate::cancel::CancelToken;
use crate::config::AppUrlConfig;
use crate::error::Result;
use crate::transfer::local::resolve_local;
use crate::transfer::{ProgressFn, S3Client, S3Transfer, Transfer, TransferContext, Transfers};
use crate::url_model::Url;

/// A resolved resource on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalResource {
    /// Cache key for cached resources; the URL path for local files.
    pub cache_path: String,
    /// Cache entry backing this resource; `None` for local files.
    pub cache_key: Option<CacheKey>,
    /// Absolute path, when the cache backend has one (always set for local files).
    pub sys_path: Option<PathBuf>,
    /// When the resource was transferred; `None` on a cache hit or for local files.
    pub fetch_time: Option<SystemTime>,
}

impl LocalResource {
    pub fn was_fetched(&self) -> bool {
        self.fetch_time.is_some()
    }
}

#[derive(Clone)]
pub struct Downloader {
    store: LockedCacheStore,
    transfers: Transfers,
    working_dir: PathBuf,
    clean: bool,
    progress: Option<ProgressFn>,
    cancel: CancelToken,
}

impl Downloader {
    /// Downloader over `backend` with the standard HTTP(S)/FTP strategies,
    /// resolving relative local paths against the process working directory.
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            store: LockedCacheStore::new(backend),
            transfers: Transfers::standard(&Default::default()),
            working_dir: std::env::current_dir().unwrap_or_default(),
            clean: false,
            progress: None,
            cancel: CancelToken::new(),
        }
    }

    /// Downloader over an [`OsCache`] at the configured cache directory.
    pub fn from_config(cfg: &AppUrlConfig) -> anyhow::Result<Self> {
        let root = cfg.cache_dir()?;
        let backend = OsCache::open(&root)?;
        tracing::debug!(root = %root.display(), "opened cache");
        let mut downloader = Self::new(Arc::new(backend)).with_clean(cfg.clean);
        downloader.transfers = Transfers::standard(&cfg.transfer);
        if let Some(dir) = &cfg.working_dir {
            downloader.working_dir = dir.clone();
        }
        Ok(downloader)
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Re-download even when the cache already holds the resource.
    pub fn with_clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Registers (or replaces) the strategy for the transfer's schemes.
    pub fn with_transfer(mut self, transfer: Arc<dyn Transfer>) -> Self {
        self.transfers.register(transfer);
        self
    }

    pub fn with_s3_client(self, client: Arc<dyn S3Client>) -> Self {
        self.with_transfer(Arc::new(S3Transfer::new(client)))
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn store(&self) -> &LockedCacheStore {
        &self.store
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Resolves `url` using the downloader's working directory.
    pub fn resolve(&self, url: &Url) -> Result<LocalResource> {
        self.resolve_in(url, &self.working_dir)
    }

    /// Resolves `url`, looking up relative local paths under `working_dir`.
    pub fn resolve_in(&self, url: &Url, working_dir: &Path) -> Result<LocalResource> {
        if url.scheme() == "file" {
            let path = resolve_local(url.path(), working_dir)?;
            return Ok(LocalResource {
                cache_path: url.path().to_string(),
                cache_key: None,
                sys_path: Some(path),
                fetch_time: None,
            });
        }

        let resource_url = url.resource_url();
        match self.download_resource_url(&resource_url) {
            Err(e) if e.is_access() => {
                let Some(alternate) = url.auth_resource_url() else {
                    return Err(e);
                };
                tracing::info!(
                    url = %resource_url,
                    alternate = %alternate,
                    "access denied; retrying with alternate url"
                );
                self.download_resource_url(&alternate)
            }
            other => other,
        }
    }

    /// Fetches a concrete transport URL into the cache.
    pub fn download_resource_url(&self, resource_url: &str) -> Result<LocalResource> {
        let key = derive_key(resource_url)?;
        let transfer = self.transfers.for_url(resource_url)?;
        let ctx = TransferContext {
            progress: self.progress.as_ref(),
            cancel: &self.cancel,
        };
        let outcome = self.store.fetch_or_populate(key, self.clean, |sink| {
            tracing::info!(url = resource_url, "fetching");
            transfer.fetch(resource_url, sink, &ctx)
        })?;
        let sys_path = self.store.backend().sys_path(outcome.key.as_str());
        Ok(LocalResource {
            cache_path: outcome.key.to_string(),
            cache_key: Some(outcome.key),
            sys_path,
            fetch_time: outcome.fetched_at,
        })
    }
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("working_dir", &self.working_dir)
            .field("clean", &self.clean)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemCache;
    use crate::error::Error;
    use crate::url_model::parse_app_url;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Serves fixed bodies for `http`/`https`, denying URLs in `denied`.
    #[derive(Default)]
    struct Scripted {
        calls: Mutex<Vec<String>>,
        denied: Vec<&'static str>,
    }

    impl Transfer for Scripted {
        fn schemes(&self) -> &[&'static str] {
            &["http", "https", "s3"]
        }

        fn fetch(&self, url: &str, sink: &mut dyn Write, _ctx: &TransferContext<'_>) -> Result<()> {
            self.calls.lock().unwrap().push(url.to_string());
            if self.denied.iter().any(|d| url.starts_with(d)) {
                return Err(Error::access(url, "HTTP 403"));
            }
            sink.write_all(url.as_bytes()).unwrap();
            Ok(())
        }
    }

    fn scripted(denied: Vec<&'static str>) -> (Arc<MemCache>, Arc<Scripted>, Downloader) {
        let cache = Arc::new(MemCache::new());
        let transfer = Arc::new(Scripted {
            denied,
            ..Default::default()
        });
        let dl = Downloader::new(cache.clone()).with_transfer(transfer.clone());
        (cache, transfer, dl)
    }

    #[test]
    fn fragment_does_not_change_cache_key() {
        let (cache, transfer, dl) = scripted(vec![]);
        let a = dl
            .resolve(&parse_app_url("http://h.org/d/a.zip#one.csv").unwrap())
            .unwrap();
        let b = dl
            .resolve(&parse_app_url("http://h.org/d/a.zip#two.csv;1").unwrap())
            .unwrap();
        assert_eq!(a.cache_key, b.cache_key);
        assert!(a.was_fetched());
        assert!(!b.was_fetched());
        assert_eq!(transfer.calls.lock().unwrap().len(), 1);
        assert_eq!(cache.contents("h.org/d/a.zip").unwrap(), b"http://h.org/d/a.zip");
        // MemCache has no system paths.
        assert_eq!(a.sys_path, None);
    }

    #[test]
    fn s3_access_denied_retries_with_alternate() {
        let (cache, transfer, dl) = scripted(vec!["https://"]);
        let res = dl
            .resolve(&parse_app_url("s3://bkt/dir/obj.csv").unwrap())
            .unwrap();
        assert_eq!(
            *transfer.calls.lock().unwrap(),
            vec![
                "https://bkt.s3.amazonaws.com/dir/obj.csv".to_string(),
                "s3://bkt/dir/obj.csv".to_string(),
            ]
        );
        let key = res.cache_key.unwrap();
        assert_eq!(key.as_str(), "bkt/dir/obj.csv");
        assert!(!cache.exists("bkt.s3.amazonaws.com/dir/obj.csv"));
    }

    #[test]
    fn access_denied_without_alternate_propagates() {
        let (_, transfer, dl) = scripted(vec!["http://"]);
        let err = dl
            .resolve(&parse_app_url("http://h.org/secret.csv").unwrap())
            .unwrap_err();
        assert!(err.is_access());
        assert_eq!(transfer.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn download_errors_are_not_retried() {
        struct Broken(AtomicUsize);
        impl Transfer for Broken {
            fn schemes(&self) -> &[&'static str] {
                &["https"]
            }
            fn fetch(&self, url: &str, _: &mut dyn Write, _: &TransferContext<'_>) -> Result<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err(Error::download(url, "HTTP 500"))
            }
        }
        let broken = Arc::new(Broken(AtomicUsize::new(0)));
        let dl = Downloader::new(Arc::new(MemCache::new())).with_transfer(broken.clone());
        let err = dl
            .resolve(&parse_app_url("s3://bkt/obj.csv").unwrap())
            .unwrap_err();
        assert!(err.is_download());
        assert_eq!(broken.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn directory_key_is_fetched_into_sibling() {
        let (cache, transfer, dl) = scripted(vec![]);
        dl.resolve(&parse_app_url("http://h.org/data/a.csv").unwrap())
            .unwrap();
        let listing = dl
            .resolve(&parse_app_url("http://h.org/data").unwrap())
            .unwrap();
        assert!(listing.was_fetched());
        assert_eq!(listing.cache_path, "h.org/data0");
        assert_eq!(cache.contents("h.org/data0").unwrap(), b"http://h.org/data");

        let root = dl.resolve(&parse_app_url("http://h.org/").unwrap()).unwrap();
        assert!(root.was_fetched());
        assert_eq!(root.cache_path, "h.org0");
        assert_eq!(
            *transfer.calls.lock().unwrap(),
            vec![
                "http://h.org/data/a.csv".to_string(),
                "http://h.org/data".to_string(),
                "http://h.org/".to_string(),
            ]
        );
    }

    #[test]
    fn clean_forces_transfer() {
        let (_, transfer, dl) = scripted(vec![]);
        let url = parse_app_url("http://h.org/a.csv").unwrap();
        dl.resolve(&url).unwrap();
        let dl = dl.with_clean(true);
        assert!(dl.resolve(&url).unwrap().was_fetched());
        assert_eq!(transfer.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn unknown_scheme_is_download_error() {
        let dl = Downloader::new(Arc::new(MemCache::new()));
        let err = dl
            .resolve(&parse_app_url("gopher://h.org/a.txt").unwrap())
            .unwrap_err();
        assert!(err.is_download());
    }

    #[test]
    fn local_file_skips_cache() {
        let work = tempfile::tempdir().unwrap();
        std::fs::write(work.path().join("zz-local.csv"), "a\n").unwrap();
        let (_, transfer, dl) = scripted(vec![]);
        let dl = dl.with_working_dir(work.path());
        let res = dl.resolve(&parse_app_url("zz-local.csv").unwrap()).unwrap();
        assert_eq!(res.sys_path, Some(work.path().join("zz-local.csv")));
        assert_eq!(res.cache_path, "zz-local.csv");
        assert_eq!(res.cache_key, None);
        assert_eq!(res.fetch_time, None);
        assert!(transfer.calls.lock().unwrap().is_empty());
    }
}
