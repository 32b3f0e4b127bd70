//! Typed resource URLs.
//!
//! A raw string is decomposed into [`UrlParts`] and bound to the best-matching
//! [`UrlVariant`] from a [`Registry`]. The variant decides what actually gets
//! transferred ([`Url::resource_url`]) while the full URL, fragment included,
//! identifies the logical member or segment requested.

mod fragment;
mod parse;
mod registry;
pub mod sql;
mod variant;

pub use fragment::Fragment;
pub use parse::UrlParts;
pub use registry::{Registry, RegistryBuilder};
pub use sql::{SqlDsnUrl, SqlUrl};
pub use variant::{
    FileUrl, FtpUrl, GenericUrl, GoogleSheetUrl, HttpUrl, S3Url, UrlVariant,
    DEFAULT_MATCH_PRIORITY, FALLBACK_MATCH_PRIORITY,
};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Caller-supplied inputs available to variants at parse time.
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
    /// DSN name to concrete connection URL, used by `sql://name` URLs.
    pub dsns: BTreeMap<String, String>,
}

impl ParseContext {
    pub fn with_dsns(dsns: BTreeMap<String, String>) -> Self {
        Self { dsns }
    }
}

/// Parses with the built-in registry and an empty context.
pub fn parse_app_url(raw: &str) -> Result<Url> {
    Registry::builtin().parse(raw)
}

/// Parses with the built-in registry and the given context.
pub fn parse_app_url_with(raw: &str, ctx: &ParseContext) -> Result<Url> {
    Registry::builtin().parse_with(raw, ctx)
}

/// A parsed address bound to its variant.
///
/// Mutation takes `&mut self`, so a shared `&Url` never changes; derive new
/// requests from a template by cloning it first.
#[derive(Clone)]
pub struct Url {
    parts: UrlParts,
    variant: Arc<dyn UrlVariant>,
    context: Arc<ParseContext>,
}

impl Url {
    pub(crate) fn new(
        parts: UrlParts,
        variant: Arc<dyn UrlVariant>,
        context: Arc<ParseContext>,
    ) -> Self {
        Self {
            parts,
            variant,
            context,
        }
    }

    pub fn variant_name(&self) -> &'static str {
        self.variant.name()
    }

    pub fn match_priority(&self) -> i32 {
        self.variant.match_priority()
    }

    pub fn parts(&self) -> &UrlParts {
        &self.parts
    }

    pub fn context(&self) -> &ParseContext {
        &self.context
    }

    pub fn scheme(&self) -> &str {
        &self.parts.scheme
    }

    pub fn scheme_extension(&self) -> Option<&str> {
        self.parts.scheme_extension.as_deref()
    }

    pub fn proto(&self) -> &str {
        self.parts.proto()
    }

    pub fn username(&self) -> Option<&str> {
        self.parts.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.parts.password.as_deref()
    }

    pub fn host(&self) -> &str {
        &self.parts.host
    }

    pub fn port(&self) -> Option<u16> {
        self.parts.port
    }

    pub fn path(&self) -> &str {
        &self.parts.path
    }

    pub fn query(&self) -> Option<&str> {
        self.parts.query.as_deref()
    }

    pub fn fragment(&self) -> &Fragment {
        &self.parts.fragment
    }

    pub fn target_file(&self) -> Option<&str> {
        self.parts.fragment.target_file.as_deref()
    }

    pub fn target_segment(&self) -> Option<&str> {
        self.parts.fragment.target_segment.as_deref()
    }

    pub fn set_target_file(&mut self, file: Option<String>) {
        self.parts.fragment.target_file = file.filter(|f| !f.is_empty());
    }

    pub fn set_target_segment(&mut self, segment: Option<String>) {
        self.parts.fragment.target_segment = segment.filter(|s| !s.is_empty());
    }

    pub fn set_fragment(&mut self, fragment: Fragment) {
        self.set_target_file(fragment.target_file);
        self.set_target_segment(fragment.target_segment);
    }

    pub fn set_password(&mut self, password: Option<String>) {
        self.parts.password = password;
    }

    pub fn set_query(&mut self, query: Option<String>) {
        self.parts.query = query;
    }

    /// Replaces the path. A non-empty path gets a leading `/` when the URL has a host.
    pub fn set_path(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.parts.path = if !self.parts.host.is_empty() && !path.is_empty() && !path.starts_with('/')
        {
            format!("/{}", path)
        } else {
            path
        };
    }

    /// The address actually transferred; see [`UrlVariant::resource_url`].
    pub fn resource_url(&self) -> String {
        self.variant.resource_url(self)
    }

    /// Alternate credentialed address, if the variant has one.
    pub fn auth_resource_url(&self) -> Option<String> {
        self.variant.auth_resource_url(self)
    }

    /// The full URL, fragment included.
    pub fn target_url(&self) -> String {
        self.to_string()
    }

    /// This URL without fragment or scheme extension.
    pub fn transport_url(&self) -> String {
        self.parts.to_url_string(false, false)
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.parts.write_to(f, true, true)
    }
}

impl fmt::Debug for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Url")
            .field("variant", &self.variant.name())
            .field("url", &self.to_string())
            .finish()
    }
}

/// Equal when bound to the same variant with equal parts; the parse context is not compared.
impl PartialEq for Url {
    fn eq(&self, other: &Self) -> bool {
        self.variant.name() == other.variant.name() && self.parts == other.parts
    }
}

impl Eq for Url {}

impl FromStr for Url {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_app_url(s)
    }
}
