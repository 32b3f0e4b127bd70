//! S3 object retrieval through a caller-supplied client.

use std::io::Write;
use std::sync::Arc;

use super::{ProgressWriter, Transfer, TransferContext};
use crate::error::{Error, Result};

/// Minimal object-store client. Implementations stream the object body into
/// `sink` and report failures however they like; the transfer wraps them.
pub trait S3Client: Send + Sync {
    fn get_object(&self, bucket: &str, key: &str, sink: &mut dyn Write) -> anyhow::Result<()>;
}

/// Serves `s3://bucket/key` URLs.
#[derive(Clone)]
pub struct S3Transfer {
    client: Arc<dyn S3Client>,
}

impl S3Transfer {
    pub fn new(client: Arc<dyn S3Client>) -> Self {
        Self { client }
    }
}

pub(crate) fn split_bucket_key(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("s3://")?;
    let (bucket, key) = rest.split_once('/')?;
    if bucket.is_empty() || key.is_empty() {
        return None;
    }
    Some((bucket, key))
}

impl Transfer for S3Transfer {
    fn schemes(&self) -> &[&'static str] {
        &["s3"]
    }

    fn fetch(&self, url: &str, sink: &mut dyn Write, ctx: &TransferContext<'_>) -> Result<()> {
        let (bucket, key) = split_bucket_key(url)
            .ok_or_else(|| Error::download(url, "expected s3://bucket/key"))?;
        ctx.check_cancelled(url)?;
        ctx.report(super::ProgressEvent::Download { url });
        tracing::debug!(bucket, key, "S3 get_object");

        let mut writer = ProgressWriter::new(sink, ctx, None);
        let result = self.client.get_object(bucket, key, &mut writer);
        ctx.check_cancelled(url)?;
        result.map_err(|e| Error::download(url, format!("failed to fetch S3 url: {:#}", e)))
    }
}
