//! libcurl streaming loop shared by the HTTP and FTP strategies.

use std::cell::RefCell;
use std::io::{self, Write};
use std::str;

use curl::easy::Easy;
use flate2::write::GzDecoder;

use super::classify::{classify_curl_error, classify_http_status};
use super::{ProgressEvent, ProgressWriter, TransferContext};
use crate::error::{Error, Result};

/// Response metadata collected from header lines. Reset on every status
/// line so only the final response of a redirect chain counts.
#[derive(Debug, Default)]
struct ResponseHead {
    status: Option<u32>,
    content_length: Option<u64>,
    gzip: bool,
}

impl ResponseHead {
    fn observe(&mut self, line: &str) {
        let line = line.trim_end();
        if line.starts_with("HTTP/") {
            *self = ResponseHead::default();
            self.status = line
                .split_whitespace()
                .nth(1)
                .and_then(|code| code.parse().ok());
            return;
        }
        let Some((name, value)) = line.split_once(':') else {
            return;
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            self.content_length = value.parse().ok();
        } else if name.eq_ignore_ascii_case("content-encoding") {
            self.gzip = value.eq_ignore_ascii_case("gzip");
        }
    }

    fn is_success(&self) -> bool {
        self.status.map_or(true, |s| (200..300).contains(&s))
    }
}

enum Body<'w, 'a, 'c> {
    /// No body bytes seen yet for the final response.
    Pending(&'w mut ProgressWriter<'a, 'c>),
    Plain(&'w mut ProgressWriter<'a, 'c>),
    Gzip(GzDecoder<&'w mut ProgressWriter<'a, 'c>>),
    Done,
}

impl Body<'_, '_, '_> {
    fn write_all(&mut self, data: &[u8], head: &ResponseHead, decode_gzip: bool) -> io::Result<()> {
        if let Body::Pending(_) = self {
            if let Body::Pending(writer) = std::mem::replace(self, Body::Done) {
                *self = if decode_gzip && head.gzip {
                    // Content-Length counts compressed bytes; totals are unknown.
                    Body::Gzip(GzDecoder::new(writer))
                } else {
                    writer.set_total(head.content_length);
                    Body::Plain(writer)
                };
            }
        }
        match self {
            Body::Plain(w) => w.write_all(data),
            Body::Gzip(d) => d.write_all(data),
            Body::Pending(_) | Body::Done => Ok(()),
        }
    }

    fn finish(self) -> io::Result<()> {
        match self {
            // Only the inner writer may be flushed once the stream is finished.
            Body::Gzip(d) => d.finish()?.flush(),
            Body::Plain(w) => w.flush(),
            Body::Pending(_) | Body::Done => Ok(()),
        }
    }
}

fn write_failure(url: &str, ctx: &TransferContext<'_>, e: io::Error) -> Error {
    if ctx.cancel.is_cancelled() {
        Error::Interrupted {
            url: url.to_string(),
        }
    } else {
        Error::download(url, format!("write to cache failed: {}", e))
    }
}

/// Runs the prepared `easy` handle and streams its body into `sink`.
///
/// With `http` set, non-2xx bodies are discarded, the final status is
/// classified, and `Content-Encoding: gzip` bodies are decompressed.
/// Returns the number of bytes written to `sink`.
pub(super) fn stream_into(
    easy: &mut Easy,
    url: &str,
    sink: &mut dyn Write,
    ctx: &TransferContext<'_>,
    http: bool,
) -> Result<u64> {
    ctx.check_cancelled(url)?;
    ctx.report(ProgressEvent::Download { url });

    easy.progress(true).map_err(|e| Error::download(url, e))?;

    let mut writer = ProgressWriter::new(sink, ctx, None);
    let head = RefCell::new(ResponseHead::default());
    let failure: RefCell<Option<Error>> = RefCell::new(None);
    let performed = {
        let body = RefCell::new(Body::Pending(&mut writer));
        let performed = {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    if let Ok(line) = str::from_utf8(data) {
                        head.borrow_mut().observe(line);
                    }
                    true
                })
                .map_err(|e| Error::download(url, e))?;
            transfer
                .write_function(|data| {
                    let head = head.borrow();
                    if !head.is_success() {
                        return Ok(data.len());
                    }
                    match body.borrow_mut().write_all(data, &head, http) {
                        Ok(()) => Ok(data.len()),
                        Err(e) => {
                            *failure.borrow_mut() = Some(write_failure(url, ctx, e));
                            Ok(0) // abort transfer
                        }
                    }
                })
                .map_err(|e| Error::download(url, e))?;
            transfer
                .progress_function(|_, _, _, _| !ctx.cancel.is_cancelled())
                .map_err(|e| Error::download(url, e))?;
            transfer.perform()
        };
        if performed.is_ok() && failure.borrow().is_none() {
            if let Err(e) = body.into_inner().finish() {
                *failure.borrow_mut() = Some(write_failure(url, ctx, e));
            }
        }
        performed
    };

    if let Some(err) = failure.into_inner() {
        return Err(err);
    }
    ctx.check_cancelled(url)?;
    if let Err(e) = performed {
        return Err(classify_curl_error(url, &e));
    }
    if http {
        let code = easy.response_code().map_err(|e| Error::download(url, e))?;
        if let Some(err) = classify_http_status(url, code) {
            return Err(err);
        }
    }
    Ok(writer.bytes_read())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_resets_on_each_status_line() {
        let mut head = ResponseHead::default();
        head.observe("HTTP/1.1 301 Moved Permanently\r\n");
        head.observe("Content-Length: 12\r\n");
        assert!(!head.is_success());
        head.observe("HTTP/1.1 200 OK\r\n");
        head.observe("content-encoding: GZIP\r\n");
        assert_eq!(head.status, Some(200));
        assert_eq!(head.content_length, None);
        assert!(head.gzip);
        assert!(head.is_success());
    }

    #[test]
    fn gzip_body_decodes_across_chunks_and_finishes() {
        use crate::cancel::CancelToken;
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let text = "id,name\n1,alpha\n2,beta\n".repeat(200);
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(text.as_bytes()).unwrap();
        let compressed = enc.finish().unwrap();

        let cancel = CancelToken::new();
        let ctx = TransferContext {
            progress: None,
            cancel: &cancel,
        };
        let head = ResponseHead {
            status: Some(200),
            content_length: Some(compressed.len() as u64),
            gzip: true,
        };
        let mut out = Vec::new();
        let mut writer = ProgressWriter::new(&mut out, &ctx, None);
        let mut body = Body::Pending(&mut writer);
        for chunk in compressed.chunks(7) {
            body.write_all(chunk, &head, true).unwrap();
        }
        body.finish().unwrap();
        assert_eq!(writer.bytes_read(), text.len() as u64);
        assert_eq!(out, text.as_bytes());
    }

    #[test]
    fn gzip_left_encoded_when_decoding_is_off() {
        use crate::cancel::CancelToken;

        let cancel = CancelToken::new();
        let ctx = TransferContext {
            progress: None,
            cancel: &cancel,
        };
        let head = ResponseHead {
            status: None,
            content_length: Some(4),
            gzip: true,
        };
        let mut out = Vec::new();
        let mut writer = ProgressWriter::new(&mut out, &ctx, None);
        let mut body = Body::Pending(&mut writer);
        body.write_all(b"\x1f\x8b..", &head, false).unwrap();
        body.finish().unwrap();
        assert_eq!(out, b"\x1f\x8b..");
    }

    #[test]
    fn head_without_status_counts_as_success() {
        let mut head = ResponseHead::default();
        head.observe("213 1024\r\n");
        assert!(head.is_success());
    }
}
