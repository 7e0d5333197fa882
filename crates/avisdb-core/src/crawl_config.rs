use std::path::PathBuf;

/// Runtime configuration for a crawl. Every component receives this by
/// value/reference at construction; there is no process-global settings
/// object.
#[derive(Clone)]
pub struct CrawlConfig {
    pub database_url: String,
    /// Storefront host the crawl targets, e.g. `www.amazon.fr`.
    pub domain: String,
    /// Review-language filter. Only appended to listing URLs when set.
    pub language: Option<String>,
    /// Listing sort order (`recent` or `helpful`).
    pub sort: String,
    /// Reviewer-type filter, e.g. `all_reviews` or `avp_only_reviews`.
    pub reviewer_type: String,
    /// Upper bound on listing pages fetched per product.
    pub max_pages: u32,
    /// Proxies cycled round-robin across fetch identities. May be empty.
    pub proxy_pool: Vec<String>,
    /// Bounds for the randomized inter-page throttle delay.
    pub sleep_min_secs: f64,
    pub sleep_max_secs: f64,
    /// Per-navigation load timeout.
    pub timeout_ms: u64,
    pub headless: bool,
    /// Where the opaque browser session blob is written/restored.
    pub storage_state_path: PathBuf,
    /// Directory for postmortem HTML/screenshot dumps on parser failure.
    pub debug_dir: PathBuf,
    /// Outer fetch attempts per page (identity rotation happens per attempt).
    pub max_fetch_attempts: u32,
    pub log_level: String,
}

impl std::fmt::Debug for CrawlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlConfig")
            .field("database_url", &"[redacted]")
            .field("domain", &self.domain)
            .field("language", &self.language)
            .field("sort", &self.sort)
            .field("reviewer_type", &self.reviewer_type)
            .field("max_pages", &self.max_pages)
            .field("proxy_pool_len", &self.proxy_pool.len())
            .field("sleep_min_secs", &self.sleep_min_secs)
            .field("sleep_max_secs", &self.sleep_max_secs)
            .field("timeout_ms", &self.timeout_ms)
            .field("headless", &self.headless)
            .field("storage_state_path", &self.storage_state_path)
            .field("debug_dir", &self.debug_dir)
            .field("max_fetch_attempts", &self.max_fetch_attempts)
            .field("log_level", &self.log_level)
            .finish()
    }
}
