//! URL variants: scheme-specific behavior selected by predicate and priority.

use super::parse::UrlParts;
use super::registry::Registry;
use super::{ParseContext, Url};
use crate::error::{Error, Result};

/// Priority of a variant that does not override [`UrlVariant::match_priority`].
pub const DEFAULT_MATCH_PRIORITY: i32 = 100;

/// Priority of the catch-all [`GenericUrl`].
pub const FALLBACK_MATCH_PRIORITY: i32 = 0;

/// A specialized kind of URL.
///
/// The registry tries variants in descending [`match_priority`](Self::match_priority)
/// order (ties by [`name`](Self::name)) and attaches the first whose
/// [`matches`](Self::matches) accepts the parsed parts.
pub trait UrlVariant: Send + Sync {
    /// Unique name; re-registering a name replaces the earlier variant.
    fn name(&self) -> &'static str;

    fn match_priority(&self) -> i32 {
        DEFAULT_MATCH_PRIORITY
    }

    fn matches(&self, parts: &UrlParts, ctx: &ParseContext) -> bool;

    /// Rejects parts this variant matched but cannot represent.
    fn validate(&self, _parts: &UrlParts) -> Result<()> {
        Ok(())
    }

    /// The address that actually gets transferred (no fragment, no extension).
    fn resource_url(&self, url: &Url) -> String {
        url.transport_url()
    }

    /// Alternate, credentialed address to retry with after an access error.
    /// `None` means the variant has no such form.
    fn auth_resource_url(&self, _url: &Url) -> Option<String> {
        None
    }

    /// Dereferences indirections (e.g. a DSN name) into a concrete Url.
    fn get_resource(&self, url: &Url, _registry: &Registry) -> Result<Url> {
        Ok(url.clone())
    }
}

/// Catch-all for schemes nothing else claims.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericUrl;

impl UrlVariant for GenericUrl {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn match_priority(&self) -> i32 {
        FALLBACK_MATCH_PRIORITY
    }

    fn matches(&self, _parts: &UrlParts, _ctx: &ParseContext) -> bool {
        true
    }
}

/// Local filesystem paths, referenced in place rather than cached.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileUrl;

impl UrlVariant for FileUrl {
    fn name(&self) -> &'static str {
        "file"
    }

    fn matches(&self, parts: &UrlParts, _ctx: &ParseContext) -> bool {
        parts.scheme == "file"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HttpUrl;

impl UrlVariant for HttpUrl {
    fn name(&self) -> &'static str {
        "http"
    }

    fn matches(&self, parts: &UrlParts, _ctx: &ParseContext) -> bool {
        matches!(parts.scheme.as_str(), "http" | "https")
    }

    fn validate(&self, parts: &UrlParts) -> Result<()> {
        require_host(parts, "HTTP")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FtpUrl;

impl UrlVariant for FtpUrl {
    fn name(&self) -> &'static str {
        "ftp"
    }

    fn matches(&self, parts: &UrlParts, _ctx: &ParseContext) -> bool {
        parts.scheme == "ftp"
    }

    fn validate(&self, parts: &UrlParts) -> Result<()> {
        require_host(parts, "FTP")
    }
}

/// `s3://bucket/key`.
///
/// Fetched first through the public HTTPS endpoint; on access denial the
/// downloader retries with the `s3://` form, which goes through the
/// credentialed S3 transfer.
#[derive(Debug, Clone, Copy, Default)]
pub struct S3Url;

impl S3Url {
    pub fn bucket(url: &Url) -> &str {
        url.host()
    }

    pub fn key(url: &Url) -> &str {
        url.path().trim_start_matches('/')
    }
}

impl UrlVariant for S3Url {
    fn name(&self) -> &'static str {
        "s3"
    }

    fn matches(&self, parts: &UrlParts, _ctx: &ParseContext) -> bool {
        parts.scheme == "s3"
    }

    fn validate(&self, parts: &UrlParts) -> Result<()> {
        require_host(parts, "S3")
    }

    fn resource_url(&self, url: &Url) -> String {
        let mut out = format!(
            "https://{}.s3.amazonaws.com/{}",
            S3Url::bucket(url),
            S3Url::key(url)
        );
        if let Some(query) = url.query() {
            out.push('?');
            out.push_str(query);
        }
        out
    }

    fn auth_resource_url(&self, url: &Url) -> Option<String> {
        Some(url.transport_url())
    }
}

/// Public Google spreadsheets, downloaded as CSV.
///
/// Accepts `gs://<sheet id>` and `https://docs.google.com/spreadsheets/d/<id>/...`;
/// the target segment selects the worksheet `gid`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoogleSheetUrl;

const GOOGLE_DOCS_HOST: &str = "docs.google.com";
const SHEETS_PATH_PREFIX: &str = "/spreadsheets/d/";

impl GoogleSheetUrl {
    pub fn sheet_id(url: &Url) -> &str {
        sheet_id(url.parts())
    }
}

fn sheet_id(parts: &UrlParts) -> &str {
    if parts.scheme == "gs" {
        return parts.host.as_str();
    }
    parts
        .path
        .strip_prefix(SHEETS_PATH_PREFIX)
        .and_then(|rest| rest.split('/').next())
        .unwrap_or("")
}

impl UrlVariant for GoogleSheetUrl {
    fn name(&self) -> &'static str {
        "google-sheet"
    }

    fn match_priority(&self) -> i32 {
        DEFAULT_MATCH_PRIORITY + 1
    }

    fn matches(&self, parts: &UrlParts, _ctx: &ParseContext) -> bool {
        match parts.scheme.as_str() {
            "gs" => true,
            "http" | "https" => {
                parts.host.eq_ignore_ascii_case(GOOGLE_DOCS_HOST)
                    && parts.path.starts_with(SHEETS_PATH_PREFIX)
            }
            _ => false,
        }
    }

    fn validate(&self, parts: &UrlParts) -> Result<()> {
        if sheet_id(parts).is_empty() {
            return Err(Error::AppUrl(format!(
                "Google sheet URL '{}' has no spreadsheet id",
                parts
            )));
        }
        Ok(())
    }

    fn resource_url(&self, url: &Url) -> String {
        let mut out = format!(
            "https://{}{}{}/export?format=csv",
            GOOGLE_DOCS_HOST,
            SHEETS_PATH_PREFIX,
            GoogleSheetUrl::sheet_id(url)
        );
        if let Some(gid) = url.target_segment() {
            out.push_str("&gid=");
            out.push_str(gid);
        }
        out
    }
}

fn require_host(parts: &UrlParts, what: &str) -> Result<()> {
    if parts.host.is_empty() {
        return Err(Error::AppUrl(format!("{} URL '{}' has no host", what, parts)));
    }
    Ok(())
}
