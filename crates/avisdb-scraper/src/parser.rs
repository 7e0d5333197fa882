//! Structural extraction of review drafts from a serialized listing page.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, trace, warn};

use avisdb_core::review::{is_native_review_id, ReviewDraft};

use crate::normalize;
use crate::selectors;
use crate::source::{FetchError, ReviewPage};

/// Extraction failure for a whole page.
#[derive(Debug, Error)]
pub enum ParseError {
    /// No block strategy matched anything. On the page after the last real
    /// one this is the normal pagination-end signal, not a fault.
    #[error("no review blocks matched any known page structure")]
    NoReviewsMatched,
}

/// Failure modes of [`extract_from_page`].
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// How many times the page is nudged before giving up on lazy content.
const LAZY_LOAD_CYCLES: usize = 3;

fn parse_selector(css: &str) -> Selector {
    Selector::parse(css).expect("known-good selector")
}

static TITLE: LazyLock<Selector> = LazyLock::new(|| parse_selector(selectors::TITLE));
static BODY: LazyLock<Selector> = LazyLock::new(|| parse_selector(selectors::BODY));
static RATING: LazyLock<Selector> = LazyLock::new(|| parse_selector(selectors::RATING));
static DATE: LazyLock<Selector> = LazyLock::new(|| parse_selector(selectors::DATE));
static VERIFIED: LazyLock<Selector> = LazyLock::new(|| parse_selector(selectors::VERIFIED_BADGE));
static HELPFUL: LazyLock<Selector> = LazyLock::new(|| parse_selector(selectors::HELPFUL_VOTES));
static REVIEWER: LazyLock<Selector> = LazyLock::new(|| parse_selector(selectors::REVIEWER_NAME));
static VARIANT: LazyLock<Selector> = LazyLock::new(|| parse_selector(selectors::VARIANT));
static NESTED_ID: LazyLock<Selector> = LazyLock::new(|| parse_selector(selectors::NESTED_ID));
static PERMALINK: LazyLock<Selector> = LazyLock::new(|| parse_selector(selectors::PERMALINK));

/// Extracts all review drafts from a serialized page.
///
/// Block strategies are tried in order; the first one matching at least one
/// element wins for the whole page. Drafts sharing a review id within the
/// page are collapsed to the first occurrence.
///
/// # Errors
///
/// Returns [`ParseError::NoReviewsMatched`] when no strategy matches.
pub fn extract_reviews(html: &str) -> Result<Vec<ReviewDraft>, ParseError> {
    let document = Html::parse_document(html);

    let mut blocks: Vec<ElementRef<'_>> = Vec::new();
    for strategy in selectors::REVIEW_BLOCKS {
        let selector = parse_selector(strategy);
        blocks = document.select(&selector).collect();
        if !blocks.is_empty() {
            debug!(strategy, matched = blocks.len(), "review blocks located");
            break;
        }
    }
    if blocks.is_empty() {
        return Err(ParseError::NoReviewsMatched);
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut drafts = Vec::with_capacity(blocks.len());
    for block in blocks {
        let Some(draft) = extract_block(&block) else {
            continue;
        };
        if seen.insert(draft.review_id.clone()) {
            drafts.push(draft);
        } else {
            trace!(review_id = %draft.review_id, "duplicate block within page skipped");
        }
    }
    Ok(drafts)
}

/// Reads the page, nudging lazy content between attempts when nothing
/// matched yet.
///
/// # Errors
///
/// Propagates content-retrieval failures, and `NoReviewsMatched` once all
/// nudge cycles are spent.
pub async fn extract_from_page(page: &dyn ReviewPage) -> Result<Vec<ReviewDraft>, ExtractError> {
    for cycle in 0..=LAZY_LOAD_CYCLES {
        let html = page.content().await?;
        match extract_reviews(&html) {
            Ok(drafts) => return Ok(drafts),
            Err(ParseError::NoReviewsMatched) if cycle < LAZY_LOAD_CYCLES => {
                debug!(cycle, "no review blocks yet, nudging lazy content");
                page.nudge_lazy_content().await;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(ParseError::NoReviewsMatched.into())
}

/// Extracts one draft from a block, or `None` when the block fails
/// validation. Field-level oddities never escape the block.
fn extract_block(block: &ElementRef<'_>) -> Option<ReviewDraft> {
    let title = non_empty(normalize::strip_rating_prefix(&text_of(block, &TITLE)));
    let body = non_empty(text_of(block, &BODY));
    let rating = first_match(block, &RATING).map(|t| normalize::normalize_rating(&t));
    let rating = rating.flatten();
    let review_date = first_match(block, &DATE).and_then(|t| normalize::normalize_date(&t));
    let verified_purchase = first_match(block, &VERIFIED)
        .is_some_and(|t| normalize::normalize_verified_purchase(&t));
    let helpful_votes = first_match(block, &HELPFUL)
        .map_or(0, |t| normalize::normalize_helpful_votes(&t));
    let reviewer_name = non_empty(text_of(block, &REVIEWER));
    let variant = non_empty(text_of(block, &VARIANT));

    // A block without any textual content is navigation chrome, not a review.
    if title.is_none() && body.is_none() {
        trace!("block without title or body skipped");
        return None;
    }

    let review_id = resolve_identity(block, title.as_deref(), body.as_deref())?;

    Some(ReviewDraft {
        review_id,
        title,
        body,
        rating,
        review_date,
        verified_purchase,
        helpful_votes,
        reviewer_name,
        variant,
    })
}

/// Resolution order for a review's identity: the block's own element id, a
/// nested `customer_review-` id, a permalink, then a content hash.
fn resolve_identity(
    block: &ElementRef<'_>,
    title: Option<&str>,
    body: Option<&str>,
) -> Option<String> {
    if let Some(id) = block.value().id() {
        if is_native_review_id(id) {
            return Some(id.to_string());
        }
        if let Some(stripped) = id.strip_prefix(selectors::NESTED_ID_PREFIX) {
            if is_native_review_id(stripped) {
                return Some(stripped.to_string());
            }
        }
    }
    for nested in block.select(&NESTED_ID) {
        if let Some(id) = nested.value().id() {
            if let Some(stripped) = id.strip_prefix(selectors::NESTED_ID_PREFIX) {
                if is_native_review_id(stripped) {
                    return Some(stripped.to_string());
                }
            }
        }
    }
    for anchor in block.select(&PERMALINK) {
        if let Some(href) = anchor.value().attr("href") {
            if let Some(id) = normalize::review_id_from_permalink(href) {
                if is_native_review_id(&id) {
                    return Some(id);
                }
            }
        }
    }
    let hashed = normalize::fallback_review_id(title.unwrap_or(""), body.unwrap_or(""));
    warn!(review_id = %hashed, "no native review id in block, using content hash");
    Some(hashed)
}

fn text_of(block: &ElementRef<'_>, selector: &Selector) -> String {
    block
        .select(selector)
        .next()
        .map(|el| normalize::clean_text(&el.text().collect::<String>()))
        .unwrap_or_default()
}

fn first_match(block: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    let text = text_of(block, selector);
    non_empty(text)
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
#[path = "parser_test.rs"]
mod tests;
