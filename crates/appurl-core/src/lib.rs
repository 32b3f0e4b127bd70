//! Typed resource URLs and a cache-keyed, lock-guarded downloader.
//!
//! Parse with [`parse_app_url`], then hand the [`Url`] to a [`Downloader`]
//! to get a [`LocalResource`] on disk.

pub mod config;
pub mod logging;

pub mod cache;
pub mod cache_key;
pub mod cancel;
pub mod downloader;
pub mod error;
pub mod transfer;
pub mod url_model;

pub use cache_key::{derive_key, CacheKey};
pub use cancel::CancelToken;
pub use downloader::{Downloader, LocalResource};
pub use error::{Error, Result};
pub use url_model::{parse_app_url, parse_app_url_with, ParseContext, Registry, Url};
