//! Crawl loop: drives a [`PageSource`] page by page, feeds the parser, and
//! persists what comes back.
//!
//! A crawl always returns a [`CrawlOutcome`] describing what happened; only
//! input validation is surfaced as an `Err`.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use avisdb_core::urls::validate_asin;
use avisdb_core::CrawlConfig;
use avisdb_db::reviews::save_reviews;

use crate::parser::{self, ExtractError, ParseError};
use crate::source::{FetchError, PageSource, ReviewPage};

/// Per-page record included in [`CrawlOutcome::pages`].
#[derive(Debug, Clone, Serialize)]
pub struct PageDetail {
    pub page: u32,
    pub reviews_parsed: usize,
    pub saved: u64,
    pub duplicates: u64,
    pub duration_secs: f64,
    pub has_next: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate result of one crawl.
#[derive(Debug, Serialize)]
pub struct CrawlOutcome {
    pub asin: String,
    /// Rows actually inserted.
    pub total_reviews: u64,
    /// Drafts the parser produced, duplicates included.
    pub total_encountered: u64,
    pub total_duplicates: u64,
    /// Highest page number that yielded reviews.
    pub total_pages: u32,
    pub errors: Vec<String>,
    pub success: bool,
    pub pages: Vec<PageDetail>,
}

impl CrawlOutcome {
    fn empty(asin: &str) -> Self {
        Self {
            asin: asin.to_string(),
            total_reviews: 0,
            total_encountered: 0,
            total_duplicates: 0,
            total_pages: 0,
            errors: Vec::new(),
            success: false,
            pages: Vec::new(),
        }
    }
}

/// Observer invoked after each page settles. Kept deliberately simple so a
/// misbehaving observer cannot influence the crawl.
pub type Progress<'a> = Option<&'a mut (dyn FnMut(&PageDetail) + Send)>;

/// Ties a page source, a database pool, and a configuration together for one
/// or more crawls.
pub struct Crawler<S: PageSource> {
    source: S,
    pool: SqlitePool,
    config: CrawlConfig,
}

impl<S: PageSource> Crawler<S> {
    pub fn new(source: S, pool: SqlitePool, config: CrawlConfig) -> Self {
        Self {
            source,
            pool,
            config,
        }
    }

    /// Crawls review pages for one product until the page cap, a natural
    /// end, or a dead end is reached.
    ///
    /// # Errors
    ///
    /// Only [`FetchError::InvalidAsin`]; everything else is folded into the
    /// returned outcome.
    pub async fn crawl_asin(
        &mut self,
        asin: &str,
        mut progress: Progress<'_>,
    ) -> Result<CrawlOutcome, FetchError> {
        if !validate_asin(asin) {
            return Err(FetchError::InvalidAsin(asin.to_string()));
        }

        info!(asin, max_pages = self.config.max_pages, "crawl starting");
        let mut outcome = CrawlOutcome::empty(asin);

        if let Err(err) = self.source.warm_start(asin).await {
            outcome.errors.push(format!("session bring-up failed: {err}"));
            self.source.shutdown().await;
            return Ok(outcome);
        }

        self.run_pages(asin, &mut outcome, &mut progress).await;
        self.source.shutdown().await;

        outcome.success = outcome.errors.is_empty();
        info!(
            asin,
            saved = outcome.total_reviews,
            duplicates = outcome.total_duplicates,
            pages = outcome.total_pages,
            success = outcome.success,
            "crawl finished"
        );
        Ok(outcome)
    }

    /// Crawls several products sequentially, one session each. An invalid
    /// asin becomes a failed outcome instead of aborting the batch.
    pub async fn crawl_batch(&mut self, asins: &[String]) -> Vec<CrawlOutcome> {
        let mut outcomes = Vec::with_capacity(asins.len());
        for asin in asins {
            match self.crawl_asin(asin, None).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    warn!(asin, %err, "asin rejected");
                    let mut failed = CrawlOutcome::empty(asin);
                    failed.errors.push(err.to_string());
                    outcomes.push(failed);
                }
            }
        }
        outcomes
    }

    async fn run_pages(
        &mut self,
        asin: &str,
        outcome: &mut CrawlOutcome,
        progress: &mut Progress<'_>,
    ) {
        let mut live: Option<Box<dyn ReviewPage>> = None;

        for page_num in 1..=self.config.max_pages {
            let started = Instant::now();

            if live.is_none() {
                match self.source.fetch_review_page(asin, page_num).await {
                    Ok(page) => live = Some(page),
                    Err(err) => {
                        warn!(asin, page = page_num, %err, "page fetch failed");
                        outcome.errors.push(format!("page {page_num}: {err}"));
                        push_detail(
                            outcome,
                            progress,
                            error_detail(page_num, started, err.to_string()),
                        );
                        continue;
                    }
                }
            }
            let Some(page) = live.as_deref() else {
                continue;
            };

            let drafts = match parser::extract_from_page(page).await {
                Ok(drafts) if drafts.is_empty() => {
                    debug!(asin, page = page_num, "page had no parseable reviews, stopping");
                    push_detail(outcome, progress, end_detail(page_num, started));
                    break;
                }
                Ok(drafts) => drafts,
                Err(ExtractError::Parse(ParseError::NoReviewsMatched)) => {
                    debug!(asin, page = page_num, "no review blocks, treating as last page");
                    push_detail(outcome, progress, end_detail(page_num, started));
                    break;
                }
                Err(ExtractError::Fetch(err)) => {
                    warn!(asin, page = page_num, %err, "page content unreadable");
                    self.dump_debug(page, asin, page_num).await;
                    outcome.errors.push(format!("page {page_num}: {err}"));
                    push_detail(
                        outcome,
                        progress,
                        error_detail(page_num, started, err.to_string()),
                    );
                    close_live(&mut live).await;
                    continue;
                }
            };

            let encountered = drafts.len() as u64;
            let saved = match save_reviews(&self.pool, asin, &drafts).await {
                Ok(saved) => saved,
                Err(err) => {
                    warn!(asin, page = page_num, %err, "persisting page failed");
                    outcome.errors.push(format!("page {page_num}: {err}"));
                    push_detail(
                        outcome,
                        progress,
                        error_detail(page_num, started, err.to_string()),
                    );
                    close_live(&mut live).await;
                    continue;
                }
            };
            let duplicates = encountered.saturating_sub(saved);

            outcome.total_encountered += encountered;
            outcome.total_reviews += saved;
            outcome.total_duplicates += duplicates;
            outcome.total_pages = page_num;

            let mut has_next = page.click_next(crate::selectors::NEXT_PAGE).await;
            if has_next {
                debug!(asin, page = page_num, "advanced in place via next control");
            } else if page_num < self.config.max_pages {
                // No usable control; fall back to direct URL navigation.
                match self.source.fetch_review_page(asin, page_num + 1).await {
                    Ok(next) => {
                        close_live(&mut live).await;
                        live = Some(next);
                        has_next = true;
                    }
                    Err(err) => {
                        warn!(asin, page = page_num + 1, %err, "no route to next page");
                    }
                }
            }

            push_detail(
                outcome,
                progress,
                PageDetail {
                    page: page_num,
                    reviews_parsed: drafts.len(),
                    saved,
                    duplicates,
                    duration_secs: started.elapsed().as_secs_f64(),
                    has_next,
                    error: None,
                },
            );

            if !has_next {
                break;
            }
            if page_num < self.config.max_pages {
                self.throttle().await;
            }
        }

        close_live(&mut live).await;
    }

    /// Randomized inter-page delay within the configured window.
    async fn throttle(&self) {
        let secs = {
            let mut rng = rand::rng();
            rng.random_range(self.config.sleep_min_secs..=self.config.sleep_max_secs)
        };
        debug!(secs, "throttling before next page");
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    }

    /// Best-effort post-mortem artifacts; failures here are logged and
    /// swallowed.
    async fn dump_debug(&self, page: &dyn ReviewPage, asin: &str, page_num: u32) {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let dir = &self.config.debug_dir;
        if let Err(err) = tokio::fs::create_dir_all(dir).await {
            warn!(%err, "debug directory unavailable");
            return;
        }
        if let Ok(html) = page.content().await {
            let path: PathBuf = dir.join(format!("{asin}_page{page_num}_{stamp}.html"));
            if let Err(err) = tokio::fs::write(&path, html).await {
                warn!(%err, "debug html dump failed");
            }
        }
        let shot: PathBuf = dir.join(format!("{asin}_page{page_num}_{stamp}.png"));
        if let Err(err) = page.screenshot(&shot).await {
            warn!(%err, "debug screenshot failed");
        }
    }
}

async fn close_live(live: &mut Option<Box<dyn ReviewPage>>) {
    if let Some(page) = live.take() {
        page.close().await;
    }
}

fn end_detail(page: u32, started: Instant) -> PageDetail {
    PageDetail {
        page,
        reviews_parsed: 0,
        saved: 0,
        duplicates: 0,
        duration_secs: started.elapsed().as_secs_f64(),
        has_next: false,
        error: None,
    }
}

fn error_detail(page: u32, started: Instant, error: String) -> PageDetail {
    PageDetail {
        page,
        reviews_parsed: 0,
        saved: 0,
        duplicates: 0,
        duration_secs: started.elapsed().as_secs_f64(),
        has_next: false,
        error: Some(error),
    }
}

fn push_detail(outcome: &mut CrawlOutcome, progress: &mut Progress<'_>, detail: PageDetail) {
    if let Some(callback) = progress.as_mut() {
        // A misbehaving observer must not take the crawl (and the browsing
        // session teardown behind it) down with it.
        let call = panic::catch_unwind(AssertUnwindSafe(|| callback(&detail)));
        if call.is_err() {
            warn!(page = detail.page, "progress observer panicked, ignoring");
        }
    }
    outcome.pages.push(detail);
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
