//! The real [`PageSource`]: Chromium sessions with identity rotation.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use tracing::{debug, info, warn};

use avisdb_core::urls::{product_page_url, review_listing_url, validate_asin, ListingOptions};
use avisdb_core::CrawlConfig;
use avisdb_scraper::selectors;
use avisdb_scraper::{FetchError, PageSource, ReviewPage};

use crate::backoff::{backoff_delay, jittered, retry_navigation};
use crate::detect::{classify, PageHealth};
use crate::identity::IdentityRotation;
use crate::session::BrowserSession;

/// Navigation retries per attempt, before the attempt is written off and
/// the identity rotated.
const NAV_RETRIES: u32 = 2;
/// Upper bound on waiting for the listing container to render.
const LISTING_WAIT: Duration = Duration::from_secs(10);

/// Obtains review pages through a headless Chromium, rotating proxy and
/// user agent when the storefront pushes back.
pub struct ChromiumFetcher {
    config: CrawlConfig,
    rotation: IdentityRotation,
    session: Option<BrowserSession>,
    /// Whether the current session has visited the product page. A freshly
    /// launched session must warm up before it hits a listing URL.
    warmed: bool,
}

impl ChromiumFetcher {
    #[must_use]
    pub fn new(config: CrawlConfig) -> Self {
        let rotation = IdentityRotation::new(config.proxy_pool.clone());
        Self {
            config,
            rotation,
            session: None,
            warmed: false,
        }
    }

    fn listing_options(&self) -> ListingOptions {
        ListingOptions {
            language: self.config.language.clone(),
            sort: Some(self.config.sort.clone()),
            reviewer_type: Some(self.config.reviewer_type.clone()),
        }
    }

    async fn ensure_session(&mut self) -> Result<&BrowserSession, FetchError> {
        if self.session.is_none() {
            let identity = self.rotation.next_identity();
            let session = BrowserSession::launch(&identity, &self.config).await?;
            self.session = Some(session);
        }
        self.session
            .as_ref()
            .ok_or_else(|| FetchError::BrowserUnavailable("session not initialized".into()))
    }

    /// Discards the current session and flips future identities to the
    /// mobile pool.
    async fn rotate_identity(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
        self.warmed = false;
        self.rotation.escalate();
    }
}

/// Back off before the next identity gets its turn; skipped once the
/// attempt budget is spent.
async fn pause(attempt: u32, max_attempts: u32) {
    if attempt < max_attempts {
        tokio::time::sleep(jittered(rotation_pause(attempt))).await;
    }
}

/// Visit the product page to pick up the storefront's session cookies before
/// any listing navigation.
async fn warm_up(
    session: &BrowserSession,
    url: &str,
    storage_path: &Path,
) -> Result<(), FetchError> {
    let page = retry_navigation(NAV_RETRIES, |a| jittered(backoff_delay(a)), || {
        session.open(url)
    })
    .await?;

    session.restore_cookies(&page, storage_path).await;
    if let Err(err) = page.reload().await {
        debug!(%err, "reload after cookie restore failed");
    }
    dismiss_cookie_banner(&page).await;
    session.save_cookies(&page, storage_path).await;
    close_tab(page).await;
    Ok(())
}

/// Wait before trying again with the next identity. The pause grows with
/// each spent attempt.
fn rotation_pause(attempt: u32) -> Duration {
    backoff_delay(attempt)
}

/// Whether a classified page goes to the parser as-is. Only an anti-bot
/// interstitial consumes a fetch attempt; login walls and error pages are
/// logged and served, since whatever loaded may still carry reviews.
fn serves_content(health: PageHealth) -> bool {
    !matches!(health, PageHealth::AntiBot)
}

#[async_trait]
impl PageSource for ChromiumFetcher {
    async fn warm_start(&mut self, asin: &str) -> Result<(), FetchError> {
        if !validate_asin(asin) {
            return Err(FetchError::InvalidAsin(asin.to_string()));
        }
        let url = product_page_url(&self.config.domain, asin);
        let storage_path = self.config.storage_state_path.clone();
        let session = self.ensure_session().await?;

        warm_up(session, &url, &storage_path).await?;
        self.warmed = true;
        info!(asin, "session warmed up on product page");
        Ok(())
    }

    async fn fetch_review_page(
        &mut self,
        asin: &str,
        page_num: u32,
    ) -> Result<Box<dyn ReviewPage>, FetchError> {
        if !validate_asin(asin) {
            return Err(FetchError::InvalidAsin(asin.to_string()));
        }
        let url = review_listing_url(
            &self.config.domain,
            asin,
            page_num,
            &self.listing_options(),
        );
        let warm_url = product_page_url(&self.config.domain, asin);
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let storage_path = self.config.storage_state_path.clone();
        let max_attempts = self.config.max_fetch_attempts.max(1);

        for attempt in 1..=max_attempts {
            if !self.warmed {
                let session = self.ensure_session().await?;
                if let Err(err) = warm_up(session, &warm_url, &storage_path).await {
                    warn!(asin, page = page_num, attempt, %err, "warm-up failed");
                    self.rotate_identity().await;
                    pause(attempt, max_attempts).await;
                    continue;
                }
                self.warmed = true;
            }
            let session = self.ensure_session().await?;

            let page = match retry_navigation(
                NAV_RETRIES,
                |a| jittered(backoff_delay(a)),
                || session.open(&url),
            )
            .await
            {
                Ok(page) => page,
                Err(err) => {
                    warn!(asin, page = page_num, attempt, %err, "navigation attempt failed");
                    self.rotate_identity().await;
                    pause(attempt, max_attempts).await;
                    continue;
                }
            };

            dismiss_cookie_banner(&page).await;
            if !wait_for_listing(&page, LISTING_WAIT.min(timeout)).await {
                debug!(asin, page = page_num, attempt, "listing container never appeared");
            }

            let html = match tokio::time::timeout(timeout, page.content()).await {
                Ok(Ok(html)) => html,
                Ok(Err(err)) => {
                    warn!(asin, page = page_num, attempt, %err, "content retrieval failed");
                    close_tab(page).await;
                    self.rotate_identity().await;
                    pause(attempt, max_attempts).await;
                    continue;
                }
                Err(_) => {
                    warn!(asin, page = page_num, attempt, "content retrieval timed out");
                    close_tab(page).await;
                    self.rotate_identity().await;
                    pause(attempt, max_attempts).await;
                    continue;
                }
            };

            let health = classify(&html);
            if !serves_content(health) {
                warn!(asin, page = page_num, attempt, "anti-bot interstitial served");
                close_tab(page).await;
                self.rotate_identity().await;
                pause(attempt, max_attempts).await;
                continue;
            }
            match health {
                PageHealth::Ok => session.save_cookies(&page, &storage_path).await,
                // Degraded but not hostile; hand the content over and let
                // the parser decide what it holds.
                PageHealth::LoginWall => {
                    warn!(asin, page = page_num, attempt, "login wall served");
                }
                PageHealth::ErrorPage => {
                    warn!(asin, page = page_num, attempt, "error page served");
                }
                PageHealth::AntiBot => {}
            }
            return Ok(Box::new(LivePage { page, timeout }));
        }

        Err(FetchError::PageUnobtainable {
            page: page_num,
            attempts: max_attempts,
        })
    }

    async fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
        self.warmed = false;
    }
}

async fn close_tab(page: Page) {
    if let Err(err) = page.close().await {
        debug!(%err, "tab close failed");
    }
}

async fn dismiss_cookie_banner(page: &Page) {
    for selector in selectors::COOKIE_BANNERS {
        if let Ok(element) = page.find_element(*selector).await {
            if element.click().await.is_ok() {
                debug!(selector, "cookie banner dismissed");
                tokio::time::sleep(Duration::from_millis(300)).await;
                return;
            }
        }
    }
}

async fn wait_for_listing(page: &Page, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if page.find_element(selectors::LISTING_READY).await.is_ok() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

/// A live Chromium tab showing a review listing.
struct LivePage {
    page: Page,
    timeout: Duration,
}

#[async_trait]
impl ReviewPage for LivePage {
    async fn content(&self) -> Result<String, FetchError> {
        tokio::time::timeout(self.timeout, self.page.content())
            .await
            .map_err(|_| FetchError::Navigation("content retrieval timed out".into()))?
            .map_err(|e| FetchError::Navigation(e.to_string()))
    }

    async fn nudge_lazy_content(&self) {
        // Bottom then back to top; the listing attaches on both passes.
        for script in [
            "window.scrollTo(0, document.body.scrollHeight)",
            "window.scrollTo(0, 0)",
        ] {
            if let Err(err) = self.page.evaluate(script).await {
                debug!(%err, "scroll nudge failed");
                return;
            }
            tokio::time::sleep(Duration::from_millis(400)).await;
        }
    }

    async fn click_next(&self, selectors: &[&str]) -> bool {
        for selector in selectors {
            let Ok(element) = self.page.find_element(*selector).await else {
                continue;
            };
            if element.click().await.is_ok() {
                debug!(selector, "next-page control clicked");
                let _ = tokio::time::timeout(self.timeout, self.page.wait_for_navigation()).await;
                tokio::time::sleep(Duration::from_millis(500)).await;
                return true;
            }
        }
        false
    }

    async fn screenshot(&self, path: &Path) -> Result<(), FetchError> {
        self.page
            .save_screenshot(
                ScreenshotParams::builder().full_page(true).build(),
                path,
            )
            .await
            .map_err(|e| FetchError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn close(self: Box<Self>) {
        close_tab(self.page).await;
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn test_config() -> CrawlConfig {
        CrawlConfig {
            database_url: "sqlite::memory:".into(),
            domain: "www.amazon.fr".into(),
            language: None,
            sort: "recent".into(),
            reviewer_type: "all_reviews".into(),
            max_pages: 5,
            proxy_pool: Vec::new(),
            sleep_min_secs: 0.0,
            sleep_max_secs: 0.0,
            timeout_ms: 1_000,
            headless: true,
            storage_state_path: PathBuf::from("storage_state.json"),
            debug_dir: std::env::temp_dir().join("avisdb-fetch-test"),
            max_fetch_attempts: 3,
            log_level: "info".into(),
        }
    }

    #[test]
    fn only_anti_bot_consumes_an_attempt() {
        assert!(!serves_content(PageHealth::AntiBot));
        assert!(serves_content(PageHealth::Ok));
        assert!(serves_content(PageHealth::LoginWall));
        assert!(serves_content(PageHealth::ErrorPage));
    }

    #[test]
    fn rotation_pauses_grow_across_the_attempt_budget() {
        // max_fetch_attempts defaults to 3, so two pauses separate them.
        let pauses: Vec<Duration> = (1..3).map(rotation_pause).collect();
        assert_eq!(
            pauses,
            vec![Duration::from_secs(4), Duration::from_secs(8)]
        );
        assert!(pauses.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn invalid_asin_is_rejected_before_any_browser_launch() {
        let mut fetcher = ChromiumFetcher::new(test_config());

        let err = fetcher
            .fetch_review_page("not-an-asin", 1)
            .await
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidAsin(_)));

        let err = fetcher.warm_start("bad").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidAsin(_)));

        assert!(fetcher.session.is_none());
    }
}
