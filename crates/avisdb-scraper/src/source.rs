//! Seam between the crawl loop and whatever actually obtains pages.
//!
//! The crawler only ever talks to [`PageSource`] and [`ReviewPage`], so the
//! whole pagination state machine can be exercised with in-memory stubs.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// Failures raised while obtaining a review page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The browsing session could not be started at all.
    #[error("browser session could not be started: {0}")]
    BrowserUnavailable(String),

    /// The product identifier is not a plausible ASIN.
    #[error("invalid ASIN {0:?}: expected 10 alphanumeric characters")]
    InvalidAsin(String),

    /// The site served an anti-bot interstitial instead of reviews.
    #[error("anti-bot challenge detected on page {page}")]
    AntiBotDetected { page: u32 },

    /// Every identity in the rotation was exhausted for this page.
    #[error("page {page} unobtainable after {attempts} attempts")]
    PageUnobtainable { page: u32, attempts: u32 },

    /// Navigation-level failure (timeout, DNS, tab crash).
    #[error("navigation failed: {0}")]
    Navigation(String),
}

/// A live review-listing page the parser can read from.
#[async_trait]
pub trait ReviewPage: Send + Sync {
    /// Current serialized DOM of the page.
    async fn content(&self) -> Result<String, FetchError>;

    /// Scrolls or otherwise prods the page so lazily rendered reviews attach.
    async fn nudge_lazy_content(&self);

    /// Tries each selector in order and clicks the first present, enabled
    /// match, waiting for the resulting load. Returns whether a click landed.
    async fn click_next(&self, selectors: &[&str]) -> bool;

    /// Best-effort screenshot for post-mortem debugging.
    async fn screenshot(&self, path: &Path) -> Result<(), FetchError>;

    /// Releases the underlying tab.
    async fn close(self: Box<Self>);
}

/// Produces review pages for a crawl.
#[async_trait]
pub trait PageSource: Send {
    /// One-time session bring-up before the first listing fetch. For a real
    /// browser this visits the product page so the session carries ordinary
    /// history and cookies.
    async fn warm_start(&mut self, asin: &str) -> Result<(), FetchError>;

    /// Navigates a fresh page to the review listing for `asin` at `page`.
    async fn fetch_review_page(
        &mut self,
        asin: &str,
        page: u32,
    ) -> Result<Box<dyn ReviewPage>, FetchError>;

    /// Tears the session down. Called exactly once per crawl, on every path.
    async fn shutdown(&mut self);
}
