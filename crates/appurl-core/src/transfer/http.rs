//! HTTP(S) GET into the cache.

use std::io::Write;

use curl::easy::Easy;

use super::curl_stream::stream_into;
use super::{Transfer, TransferContext};
use crate::config::TransferConfig;
use crate::error::{Error, Result};

/// Single-stream GET with redirects followed and gzip bodies decoded.
#[derive(Debug, Clone, Default)]
pub struct HttpTransfer {
    config: TransferConfig,
}

impl HttpTransfer {
    pub fn new(config: TransferConfig) -> Self {
        Self { config }
    }

    fn prepare(&self, url: &str) -> std::result::Result<Easy, curl::Error> {
        let cfg = &self.config;
        let mut easy = Easy::new();
        easy.url(url)?;
        easy.get(true)?;
        easy.follow_location(true)?;
        easy.max_redirections(cfg.max_redirections)?;
        easy.connect_timeout(cfg.connect_timeout())?;
        easy.low_speed_limit(cfg.low_speed_limit)?;
        easy.low_speed_time(cfg.low_speed_time())?;
        easy.timeout(cfg.timeout())?;
        if let Some(agent) = &cfg.user_agent {
            easy.useragent(agent)?;
        }
        Ok(easy)
    }
}

impl Transfer for HttpTransfer {
    fn schemes(&self) -> &[&'static str] {
        &["http", "https"]
    }

    fn fetch(&self, url: &str, sink: &mut dyn Write, ctx: &TransferContext<'_>) -> Result<()> {
        tracing::debug!(url, "GET");
        let mut easy = self.prepare(url).map_err(|e| Error::download(url, e))?;
        let written = stream_into(&mut easy, url, sink, ctx, true)?;
        tracing::debug!(url, bytes = written, "GET complete");
        Ok(())
    }
}
