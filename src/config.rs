use std::path::PathBuf;

use anyhow::Context;
use url::Url;

use crate::error::Result;

pub const DEFAULT_SITE: &str = "learning.oreilly.com";
pub const DEFAULT_COOKIES: &str = "cookies.json";
pub const DEFAULT_BOOKS_DIR: &str = "Books";

/// Everything a single `download` invocation needs.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub book_id: String,
    pub cookies: PathBuf,
    pub output: PathBuf,
    pub kindle: bool,
    /// Bare host (`learning.oreilly.com`) or a full base url.
    pub site_url: String,
}

impl DownloadConfig {
    pub fn new(book_id: impl Into<String>) -> Self {
        Self {
            book_id: book_id.into(),
            cookies: PathBuf::from(DEFAULT_COOKIES),
            output: PathBuf::from(DEFAULT_BOOKS_DIR),
            kindle: false,
            site_url: DEFAULT_SITE.to_string(),
        }
    }

    pub fn base_url(&self) -> Result<Url> {
        let site = self.site_url.trim().trim_end_matches('/');
        let site = if site.is_empty() { DEFAULT_SITE } else { site };
        let raw = if site.contains("://") {
            site.to_string()
        } else {
            format!("https://{}", site)
        };

        Ok(Url::parse(&raw).with_context(|| format!("invalid site url: {}", self.site_url))?)
    }
}
