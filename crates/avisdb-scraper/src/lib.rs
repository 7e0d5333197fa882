//! Review extraction and crawl orchestration.
//!
//! The crate is split along one seam: [`source::PageSource`] produces live
//! pages, [`parser`] turns their DOM into [`avisdb_core::ReviewDraft`]s, and
//! [`orchestrator::Crawler`] walks the pagination while persisting results.

pub mod normalize;
pub mod orchestrator;
pub mod parser;
pub mod selectors;
pub mod source;

pub use orchestrator::{CrawlOutcome, Crawler, PageDetail, Progress};
pub use parser::{extract_reviews, ExtractError, ParseError};
pub use source::{FetchError, PageSource, ReviewPage};
