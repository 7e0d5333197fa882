//! Lifecycle of one Chromium process presenting one fetch identity.
//!
//! The proxy is a process-level argument, so rotating identity means
//! tearing the session down and launching a new one.

use std::path::Path;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use avisdb_core::CrawlConfig;
use avisdb_scraper::FetchError;

use crate::identity::FetchIdentity;

pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    timeout: Duration,
}

impl BrowserSession {
    /// Launches Chromium configured for `identity`.
    ///
    /// # Errors
    ///
    /// [`FetchError::BrowserUnavailable`] when the process cannot start.
    pub async fn launch(
        identity: &FetchIdentity,
        config: &CrawlConfig,
    ) -> Result<Self, FetchError> {
        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--lang=fr-FR")
            .arg(format!("--user-agent={}", identity.user_agent));
        builder = if identity.mobile {
            builder.window_size(412, 915)
        } else {
            builder.window_size(1366, 900)
        };
        if let Some(proxy) = &identity.proxy {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }
        if !config.headless {
            builder = builder.with_head();
        }

        let browser_config = builder.build().map_err(FetchError::BrowserUnavailable)?;
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| FetchError::BrowserUnavailable(e.to_string()))?;
        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        debug!(
            mobile = identity.mobile,
            proxied = identity.proxy.is_some(),
            "browser session launched"
        );
        Ok(Self {
            browser,
            handler_task,
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    /// Opens a tab on `url`, bounded by the configured navigation timeout.
    ///
    /// # Errors
    ///
    /// [`FetchError::Navigation`] on timeout or protocol failure.
    pub async fn open(&self, url: &str) -> Result<Page, FetchError> {
        let page = tokio::time::timeout(self.timeout, self.browser.new_page(url))
            .await
            .map_err(|_| FetchError::Navigation(format!("load of {url} timed out")))?
            .map_err(|e| FetchError::Navigation(e.to_string()))?;
        let _ = tokio::time::timeout(self.timeout, page.wait_for_navigation()).await;
        Ok(page)
    }

    /// Restores cookies persisted by a previous session onto `page`.
    /// Missing or stale blobs are ignored.
    pub async fn restore_cookies(&self, page: &Page, path: &Path) {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(_) => return,
        };
        let cookies: Vec<CookieParam> = match serde_json::from_slice(&raw) {
            Ok(cookies) => cookies,
            Err(err) => {
                warn!(%err, path = %path.display(), "session blob unreadable, starting fresh");
                return;
            }
        };
        let count = cookies.len();
        if let Err(err) = page.set_cookies(cookies).await {
            warn!(%err, "cookie restore failed");
        } else {
            debug!(count, "session cookies restored");
        }
    }

    /// Writes the session's cookies to `path` for the next run. Best-effort.
    pub async fn save_cookies(&self, page: &Page, path: &Path) {
        let cookies = match page.get_cookies().await {
            Ok(cookies) => cookies,
            Err(err) => {
                warn!(%err, "cookie read failed, session not persisted");
                return;
            }
        };
        let blob = match serde_json::to_vec_pretty(&cookies) {
            Ok(blob) => blob,
            Err(err) => {
                warn!(%err, "cookie serialization failed");
                return;
            }
        };
        if let Some(parent) = path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        if let Err(err) = tokio::fs::write(path, blob).await {
            warn!(%err, path = %path.display(), "session persist failed");
        }
    }

    /// Closes the browser process and its handler task.
    pub async fn close(mut self) {
        if let Err(err) = self.browser.close().await {
            warn!(%err, "browser close failed");
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}
