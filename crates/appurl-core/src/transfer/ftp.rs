//! FTP binary retrieval into the cache.

use std::io::Write;

use curl::easy::Easy;

use super::curl_stream::stream_into;
use super::{Transfer, TransferContext};
use crate::config::TransferConfig;
use crate::error::{Error, Result};

const ANONYMOUS_USER: &str = "anonymous";
const ANONYMOUS_PASSWORD: &str = "anonymous@";

/// `RETR` in binary mode (libcurl's default `TYPE I`). Logs in anonymously
/// unless the URL carries credentials.
#[derive(Debug, Clone, Default)]
pub struct FtpTransfer {
    config: TransferConfig,
}

impl FtpTransfer {
    pub fn new(config: TransferConfig) -> Self {
        Self { config }
    }

    fn prepare(&self, url: &str, anonymous: bool) -> std::result::Result<Easy, curl::Error> {
        let cfg = &self.config;
        let mut easy = Easy::new();
        easy.url(url)?;
        if anonymous {
            easy.username(ANONYMOUS_USER)?;
            easy.password(ANONYMOUS_PASSWORD)?;
        }
        easy.connect_timeout(cfg.connect_timeout())?;
        easy.low_speed_limit(cfg.low_speed_limit)?;
        easy.low_speed_time(cfg.low_speed_time())?;
        easy.timeout(cfg.timeout())?;
        Ok(easy)
    }
}

fn has_credentials(url: &str) -> Result<bool> {
    let parsed = url::Url::parse(url).map_err(|e| Error::download(url, e))?;
    Ok(!parsed.username().is_empty())
}

impl Transfer for FtpTransfer {
    fn schemes(&self) -> &[&'static str] {
        &["ftp"]
    }

    fn fetch(&self, url: &str, sink: &mut dyn Write, ctx: &TransferContext<'_>) -> Result<()> {
        let anonymous = !has_credentials(url)?;
        tracing::debug!(url, anonymous, "RETR");
        let mut easy = self
            .prepare(url, anonymous)
            .map_err(|e| Error::download(url, e))?;
        let written = stream_into(&mut easy, url, sink, ctx, false)?;
        tracing::debug!(url, bytes = written, "RETR complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_detected_from_userinfo() {
        assert!(!has_credentials("ftp://ftp.example.com/pub/a.csv").unwrap());
        assert!(has_credentials("ftp://bob:pw@ftp.example.com/pub/a.csv").unwrap());
        assert!(has_credentials("ftp://not a url").is_err());
    }
}
