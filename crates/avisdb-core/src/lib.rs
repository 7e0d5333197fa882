use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

pub mod config;
pub mod crawl_config;
pub mod review;
pub mod urls;

pub use config::{load_crawl_config, load_crawl_config_from_env};
pub use crawl_config::CrawlConfig;
pub use review::ReviewDraft;
pub use urls::{parse_listing_url, product_page_url, review_listing_url, validate_asin};
