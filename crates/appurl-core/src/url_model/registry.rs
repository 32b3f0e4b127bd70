//! Variant registry: built once, immutable afterwards, threaded through parsing.

use std::cmp::Reverse;
use std::sync::{Arc, OnceLock};

use super::parse::UrlParts;
use super::sql::{SqlDsnUrl, SqlUrl};
use super::variant::{FileUrl, FtpUrl, GenericUrl, GoogleSheetUrl, HttpUrl, S3Url, UrlVariant};
use super::{ParseContext, Url};
use crate::error::{Error, Result};

/// Immutable, ordered set of URL variants.
///
/// Selection depends only on priority and name, never on registration order.
#[derive(Clone)]
pub struct Registry {
    variants: Arc<[Arc<dyn UrlVariant>]>,
}

/// Collects variants; [`build`](Self::build) freezes them into a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    variants: Vec<Arc<dyn UrlVariant>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every built-in variant, including the generic fallback.
    pub fn with_builtins(self) -> Self {
        self.register(GenericUrl)
            .register(FileUrl)
            .register(HttpUrl)
            .register(FtpUrl)
            .register(S3Url)
            .register(GoogleSheetUrl)
            .register(SqlUrl)
            .register(SqlDsnUrl)
    }

    pub fn register(self, variant: impl UrlVariant + 'static) -> Self {
        self.register_arc(Arc::new(variant))
    }

    /// Registering a name twice keeps only the latest variant, so repeated
    /// initialization is harmless.
    pub fn register_arc(mut self, variant: Arc<dyn UrlVariant>) -> Self {
        self.variants.retain(|v| v.name() != variant.name());
        self.variants.push(variant);
        self
    }

    pub fn build(mut self) -> Registry {
        self.variants
            .sort_by_key(|v| (Reverse(v.match_priority()), v.name()));
        Registry {
            variants: self.variants.into(),
        }
    }
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Process-wide registry of the built-in variants, built on first use.
    pub fn builtin() -> &'static Registry {
        static BUILTIN: OnceLock<Registry> = OnceLock::new();
        BUILTIN.get_or_init(|| RegistryBuilder::new().with_builtins().build())
    }

    pub fn parse(&self, raw: &str) -> Result<Url> {
        self.parse_with(raw, &ParseContext::default())
    }

    /// Parses `raw` and attaches the highest-priority matching variant.
    ///
    /// The first matching variant decides: if it rejects the parts, that
    /// rejection is the result.
    pub fn parse_with(&self, raw: &str, ctx: &ParseContext) -> Result<Url> {
        let parts = UrlParts::parse(raw)?;
        let variant = self
            .variants
            .iter()
            .find(|v| v.matches(&parts, ctx))
            .ok_or_else(|| Error::AppUrl(format!("no URL variant matches '{}'", raw)))?;
        variant.validate(&parts)?;
        tracing::trace!(url = raw, variant = variant.name(), "parsed URL");
        Ok(Url::new(parts, Arc::clone(variant), Arc::new(ctx.clone())))
    }

    /// Dereferences `url` through its variant (e.g. DSN lookup).
    pub fn get_resource(&self, url: &Url) -> Result<Url> {
        url.variant.get_resource(url, self)
    }

    /// Variant names in selection order.
    pub fn variant_names(&self) -> Vec<&'static str> {
        self.variants.iter().map(|v| v.name()).collect()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("variants", &self.variant_names())
            .finish()
    }
}
