//! Chromium-backed page source for the crawler.
//!
//! Supplies the real implementation of [`avisdb_scraper::PageSource`]:
//! session lifecycle ([`session`]), identity rotation ([`identity`]),
//! served-page classification ([`detect`]), and navigation retry policy
//! ([`backoff`]).

pub mod backoff;
pub mod detect;
pub mod fetch;
pub mod identity;
pub mod session;

pub use detect::{classify, PageHealth};
pub use fetch::ChromiumFetcher;
pub use identity::{FetchIdentity, IdentityRotation};
