//! Per-scheme byte transfer into a cache sink.
//!
//! Each [`Transfer`] streams one resource URL into a writer, reporting
//! progress through an optional callback and honoring the cancel token.
//! Local files are never transferred; see [`local`].

mod classify;
mod curl_stream;
mod ftp;
mod http;
pub mod local;
mod s3;

pub use classify::{classify_curl_error, classify_http_status};
pub use ftp::FtpTransfer;
pub use http::HttpTransfer;
pub use s3::{S3Client, S3Transfer};

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::config::TransferConfig;
use crate::error::{Error, Result};

/// Observation passed to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent<'a> {
    /// A transfer of `url` is starting.
    Download { url: &'a str },
    /// Bytes copied into the cache so far; `total` when the size is known.
    CopyFile { bytes_read: u64, total: Option<u64> },
}

impl ProgressEvent<'_> {
    pub fn phase(&self) -> &'static str {
        match self {
            ProgressEvent::Download { .. } => "download",
            ProgressEvent::CopyFile { .. } => "copy_file",
        }
    }
}

/// Purely observational progress hook.
pub type ProgressFn = Arc<dyn Fn(ProgressEvent<'_>) + Send + Sync>;

/// Per-call state shared by every strategy.
#[derive(Clone, Copy)]
pub struct TransferContext<'a> {
    pub progress: Option<&'a ProgressFn>,
    pub cancel: &'a CancelToken,
}

impl TransferContext<'_> {
    pub fn report(&self, event: ProgressEvent<'_>) {
        if let Some(cb) = self.progress {
            cb(event);
        }
    }

    pub fn check_cancelled(&self, url: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Interrupted {
                url: url.to_string(),
            });
        }
        Ok(())
    }
}

/// A byte-transfer strategy for one or more URL schemes.
pub trait Transfer: Send + Sync {
    /// Lowercase schemes served by this strategy.
    fn schemes(&self) -> &[&'static str];

    /// Streams `url` into `sink`. Returns [`Error::Access`] when the remote
    /// denies access, [`Error::Download`] for other failures.
    fn fetch(&self, url: &str, sink: &mut dyn Write, ctx: &TransferContext<'_>) -> Result<()>;
}

/// Scheme -> strategy table.
#[derive(Clone, Default)]
pub struct Transfers {
    by_scheme: HashMap<&'static str, Arc<dyn Transfer>>,
}

impl Transfers {
    pub fn new() -> Self {
        Self::default()
    }

    /// HTTP(S) and FTP over libcurl. S3 needs a client and is added with
    /// [`register`](Self::register).
    pub fn standard(config: &TransferConfig) -> Self {
        let mut transfers = Self::new();
        transfers.register(Arc::new(HttpTransfer::new(config.clone())));
        transfers.register(Arc::new(FtpTransfer::new(config.clone())));
        transfers
    }

    /// Registers `transfer` for each of its schemes, replacing earlier ones.
    pub fn register(&mut self, transfer: Arc<dyn Transfer>) {
        for scheme in transfer.schemes() {
            self.by_scheme.insert(scheme, Arc::clone(&transfer));
        }
    }

    /// Strategy for the scheme of `url`.
    pub fn for_url(&self, url: &str) -> Result<&Arc<dyn Transfer>> {
        let scheme = url
            .split_once(':')
            .map(|(s, _)| s.to_ascii_lowercase())
            .unwrap_or_default();
        self.by_scheme
            .get(scheme.as_str())
            .ok_or_else(|| Error::download(url, format!("no transfer strategy for scheme '{}'", scheme)))
    }
}

/// Writer adapter that reports cumulative bytes and stops on cancellation.
pub struct ProgressWriter<'a, 'c> {
    inner: &'a mut dyn Write,
    ctx: &'a TransferContext<'c>,
    bytes_read: u64,
    total: Option<u64>,
}

impl<'a, 'c> ProgressWriter<'a, 'c> {
    pub fn new(inner: &'a mut dyn Write, ctx: &'a TransferContext<'c>, total: Option<u64>) -> Self {
        Self {
            inner,
            ctx,
            bytes_read: 0,
            total,
        }
    }

    pub fn set_total(&mut self, total: Option<u64>) {
        self.total = total;
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl Write for ProgressWriter<'_, '_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.ctx.cancel.is_cancelled() {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "transfer cancelled"));
        }
        let n = self.inner.write(buf)?;
        self.bytes_read += n as u64;
        self.ctx.report(ProgressEvent::CopyFile {
            bytes_read: self.bytes_read,
            total: self.total,
        });
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
