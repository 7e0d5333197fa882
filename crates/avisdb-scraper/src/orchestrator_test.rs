use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use super::*;
use crate::source::{FetchError, PageSource, ReviewPage};

// "sqlite::memory:" databases are per-connection, so the pool is pinned to
// a single connection.
async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    avisdb_db::run_migrations(&pool).await.unwrap();
    pool
}

fn test_config(max_pages: u32) -> avisdb_core::CrawlConfig {
    avisdb_core::CrawlConfig {
        database_url: "sqlite::memory:".into(),
        domain: "www.amazon.fr".into(),
        language: None,
        sort: "recent".into(),
        reviewer_type: "all_reviews".into(),
        max_pages,
        proxy_pool: Vec::new(),
        sleep_min_secs: 0.0,
        sleep_max_secs: 0.0,
        timeout_ms: 1_000,
        headless: true,
        storage_state_path: PathBuf::from("storage_state.json"),
        debug_dir: std::env::temp_dir().join("avisdb-orchestrator-test"),
        max_fetch_attempts: 3,
        log_level: "info".into(),
    }
}

fn review_html(review_id: &str, body: &str) -> String {
    format!(
        "<html><body><div id=\"cm_cr-review_list\">\
           <div data-hook=\"review\" id=\"{review_id}\">\
             <span data-hook=\"review-body\">{body}</span>\
           </div>\
         </div></body></html>"
    )
}

const EMPTY_PAGE: &str = "<html><body><p>Aucun avis pour ce produit.</p></body></html>";

struct StubPage {
    html: String,
}

#[async_trait]
impl ReviewPage for StubPage {
    async fn content(&self) -> Result<String, FetchError> {
        Ok(self.html.clone())
    }
    async fn nudge_lazy_content(&self) {}
    async fn click_next(&self, _selectors: &[&str]) -> bool {
        false
    }
    async fn screenshot(&self, _path: &Path) -> Result<(), FetchError> {
        Ok(())
    }
    async fn close(self: Box<Self>) {}
}

/// A page that advances through a sequence of snapshots on `click_next`,
/// mimicking in-place pagination.
struct WalkingPage {
    snapshots: Vec<String>,
    cursor: Mutex<usize>,
}

#[async_trait]
impl ReviewPage for WalkingPage {
    async fn content(&self) -> Result<String, FetchError> {
        let cursor = *self.cursor.lock().unwrap();
        Ok(self.snapshots[cursor].clone())
    }
    async fn nudge_lazy_content(&self) {}
    async fn click_next(&self, _selectors: &[&str]) -> bool {
        let mut cursor = self.cursor.lock().unwrap();
        if *cursor + 1 < self.snapshots.len() {
            *cursor += 1;
            true
        } else {
            false
        }
    }
    async fn screenshot(&self, _path: &Path) -> Result<(), FetchError> {
        Ok(())
    }
    async fn close(self: Box<Self>) {}
}

/// Serves canned HTML per page number and records every call.
struct StubSource {
    pages: HashMap<u32, String>,
    failing_pages: Vec<u32>,
    fetch_calls: Arc<AtomicU32>,
    warm_starts: Arc<AtomicU32>,
    shutdowns: Arc<AtomicU32>,
    fail_warm_start: bool,
}

impl StubSource {
    fn new(pages: Vec<(u32, String)>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
            failing_pages: Vec::new(),
            fetch_calls: Arc::new(AtomicU32::new(0)),
            warm_starts: Arc::new(AtomicU32::new(0)),
            shutdowns: Arc::new(AtomicU32::new(0)),
            fail_warm_start: false,
        }
    }
}

#[async_trait]
impl PageSource for StubSource {
    async fn warm_start(&mut self, _asin: &str) -> Result<(), FetchError> {
        self.warm_starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_warm_start {
            return Err(FetchError::BrowserUnavailable("no executable".into()));
        }
        Ok(())
    }

    async fn fetch_review_page(
        &mut self,
        _asin: &str,
        page: u32,
    ) -> Result<Box<dyn ReviewPage>, FetchError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_pages.contains(&page) {
            return Err(FetchError::PageUnobtainable { page, attempts: 3 });
        }
        let html = self
            .pages
            .get(&page)
            .cloned()
            .unwrap_or_else(|| EMPTY_PAGE.to_string());
        Ok(Box::new(StubPage { html }))
    }

    async fn shutdown(&mut self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

const ASIN: &str = "B07TEST123";

#[tokio::test]
async fn natural_end_after_two_pages() {
    let source = StubSource::new(vec![
        (1, review_html("R1AAAAAA", "Premier avis.")),
        (2, review_html("R2BBBBBB", "Deuxième avis.")),
        (3, EMPTY_PAGE.to_string()),
    ]);
    let shutdowns = Arc::clone(&source.shutdowns);
    let pool = test_pool().await;
    let mut crawler = Crawler::new(source, pool.clone(), test_config(5));

    let outcome = crawler.crawl_asin(ASIN, None).await.unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.total_pages, 2);
    assert_eq!(outcome.total_reviews, 2);
    assert_eq!(outcome.total_encountered, 2);
    assert_eq!(outcome.total_duplicates, 0);
    // The empty page still gets a detail entry marking the stop.
    assert_eq!(outcome.pages.len(), 3);
    assert!(!outcome.pages[2].has_next);
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);

    let count = avisdb_db::reviews::count_reviews_for_asin(&pool, ASIN)
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn page_cap_bounds_the_crawl() {
    let source = StubSource::new(vec![
        (1, review_html("R1AAAAAA", "Un.")),
        (2, review_html("R2BBBBBB", "Deux.")),
        (3, review_html("R3CCCCCC", "Trois.")),
    ]);
    let pool = test_pool().await;
    let mut crawler = Crawler::new(source, pool, test_config(2));

    let outcome = crawler.crawl_asin(ASIN, None).await.unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.total_pages, 2);
    assert_eq!(outcome.total_reviews, 2);
}

#[tokio::test]
async fn fetch_failure_is_recorded_and_crawl_continues() {
    let mut source = StubSource::new(vec![
        (2, review_html("R2BBBBBB", "Seule page lisible.")),
        (3, EMPTY_PAGE.to_string()),
    ]);
    source.failing_pages.push(1);
    let pool = test_pool().await;
    let mut crawler = Crawler::new(source, pool.clone(), test_config(5));

    let outcome = crawler.crawl_asin(ASIN, None).await.unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].contains("page 1"));
    assert_eq!(outcome.total_reviews, 1);

    let count = avisdb_db::reviews::count_reviews_for_asin(&pool, ASIN)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn session_bring_up_failure_aborts_before_any_page() {
    let mut source = StubSource::new(vec![(1, review_html("R1AAAAAA", "Jamais lu."))]);
    source.fail_warm_start = true;
    let fetch_calls = Arc::clone(&source.fetch_calls);
    let shutdowns = Arc::clone(&source.shutdowns);
    let pool = test_pool().await;
    let mut crawler = Crawler::new(source, pool, test_config(5));

    let outcome = crawler.crawl_asin(ASIN, None).await.unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.total_pages, 0);
    assert_eq!(outcome.pages.len(), 0);
    assert_eq!(fetch_calls.load(Ordering::SeqCst), 0);
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalid_asin_is_rejected_up_front() {
    let source = StubSource::new(Vec::new());
    let warm_starts = Arc::clone(&source.warm_starts);
    let pool = test_pool().await;
    let mut crawler = Crawler::new(source, pool, test_config(5));

    let err = crawler.crawl_asin("not-an-asin", None).await.unwrap_err();

    assert!(matches!(err, FetchError::InvalidAsin(_)));
    assert_eq!(warm_starts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn duplicates_across_pages_are_counted_not_saved() {
    let source = StubSource::new(vec![
        (1, review_html("R1AAAAAA", "Même avis.")),
        (2, review_html("R1AAAAAA", "Même avis.")),
        (3, EMPTY_PAGE.to_string()),
    ]);
    let pool = test_pool().await;
    let mut crawler = Crawler::new(source, pool, test_config(5));

    let outcome = crawler.crawl_asin(ASIN, None).await.unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.total_encountered, 2);
    assert_eq!(outcome.total_reviews, 1);
    assert_eq!(outcome.total_duplicates, 1);
}

#[tokio::test]
async fn progress_callback_sees_every_page_detail() {
    let source = StubSource::new(vec![
        (1, review_html("R1AAAAAA", "Un.")),
        (2, review_html("R2BBBBBB", "Deux.")),
        (3, EMPTY_PAGE.to_string()),
    ]);
    let pool = test_pool().await;
    let mut crawler = Crawler::new(source, pool, test_config(5));

    let mut seen: Vec<u32> = Vec::new();
    let mut callback = |detail: &PageDetail| seen.push(detail.page);
    let outcome = crawler.crawl_asin(ASIN, Some(&mut callback)).await.unwrap();

    assert_eq!(seen, vec![1, 2, 3]);
    assert_eq!(outcome.pages.len(), seen.len());
}

#[tokio::test]
async fn panicking_observer_does_not_abort_the_crawl() {
    let source = StubSource::new(vec![
        (1, review_html("R1AAAAAA", "Un.")),
        (2, review_html("R2BBBBBB", "Deux.")),
        (3, EMPTY_PAGE.to_string()),
    ]);
    let shutdowns = Arc::clone(&source.shutdowns);
    let pool = test_pool().await;
    let mut crawler = Crawler::new(source, pool, test_config(5));

    let mut seen: u32 = 0;
    let mut callback = |_: &PageDetail| {
        seen += 1;
        panic!("observer blew up");
    };
    let outcome = crawler.crawl_asin(ASIN, Some(&mut callback)).await.unwrap();

    // Every page still ran, the details were recorded, and the session was
    // released exactly once.
    assert_eq!(seen, 3);
    assert!(outcome.success);
    assert_eq!(outcome.total_pages, 2);
    assert_eq!(outcome.pages.len(), 3);
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn in_place_next_click_reuses_the_same_tab() {
    struct WalkingSource {
        fetch_calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl PageSource for WalkingSource {
        async fn warm_start(&mut self, _asin: &str) -> Result<(), FetchError> {
            Ok(())
        }
        async fn fetch_review_page(
            &mut self,
            _asin: &str,
            _page: u32,
        ) -> Result<Box<dyn ReviewPage>, FetchError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(WalkingPage {
                snapshots: vec![
                    review_html("R1AAAAAA", "Un."),
                    review_html("R2BBBBBB", "Deux."),
                    EMPTY_PAGE.to_string(),
                ],
                cursor: Mutex::new(0),
            }))
        }
        async fn shutdown(&mut self) {}
    }

    let fetch_calls = Arc::new(AtomicU32::new(0));
    let source = WalkingSource {
        fetch_calls: Arc::clone(&fetch_calls),
    };
    let pool = test_pool().await;
    let mut crawler = Crawler::new(source, pool, test_config(5));

    let outcome = crawler.crawl_asin(ASIN, None).await.unwrap();

    // One navigation, every further page reached through the next control.
    assert_eq!(fetch_calls.load(Ordering::SeqCst), 1);
    assert!(outcome.success);
    assert_eq!(outcome.total_pages, 2);
    assert_eq!(outcome.total_reviews, 2);
}

#[tokio::test]
async fn batch_isolates_invalid_asins() {
    let source = StubSource::new(vec![
        (1, review_html("R1AAAAAA", "Un.")),
        (2, EMPTY_PAGE.to_string()),
    ]);
    let pool = test_pool().await;
    let mut crawler = Crawler::new(source, pool, test_config(5));

    let outcomes = crawler
        .crawl_batch(&["bad".to_string(), ASIN.to_string()])
        .await;

    assert_eq!(outcomes.len(), 2);
    assert!(!outcomes[0].success);
    assert!(outcomes[0].errors[0].contains("invalid ASIN"));
    assert!(outcomes[1].success);
    assert_eq!(outcomes[1].total_reviews, 1);
}
