use std::path::PathBuf;

use crate::crawl_config::CrawlConfig;
use crate::ConfigError;

/// Load crawl configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_crawl_config() -> Result<CrawlConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_crawl_config_from_env()
}

/// Load crawl configuration from environment variables already in the process.
///
/// Unlike [`load_crawl_config`], this does NOT load `.env` files; use it when
/// the caller manages env setup itself.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_crawl_config_from_env() -> Result<CrawlConfig, ConfigError> {
    build_crawl_config(|key| std::env::var(key))
}

/// Build crawl configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual
/// environment so it can be tested with a pure `HashMap` lookup.
fn build_crawl_config<F>(lookup: F) -> Result<CrawlConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_f64 = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<f64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        let raw = or_default(var, default);
        match raw.as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("expected a boolean, got \"{other}\""),
            }),
        }
    };

    let database_url = require("DATABASE_URL")?;

    let domain = or_default("AVISDB_DOMAIN", "www.amazon.fr");
    let language = lookup("AVISDB_LANGUAGE").ok().filter(|s| !s.is_empty());
    let sort = or_default("AVISDB_SORT", "recent");
    let reviewer_type = or_default("AVISDB_REVIEWER_TYPE", "all_reviews");

    let max_pages = parse_u32("AVISDB_MAX_PAGES", "5")?;
    if max_pages == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "AVISDB_MAX_PAGES".to_string(),
            reason: "must be > 0".to_string(),
        });
    }

    let proxy_pool: Vec<String> = lookup("AVISDB_PROXY_POOL")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let sleep_min_secs = parse_f64("AVISDB_SLEEP_MIN_SECS", "2.0")?;
    let sleep_max_secs = parse_f64("AVISDB_SLEEP_MAX_SECS", "4.0")?;
    if sleep_max_secs < sleep_min_secs {
        return Err(ConfigError::InvalidEnvVar {
            var: "AVISDB_SLEEP_MAX_SECS".to_string(),
            reason: format!("must be >= AVISDB_SLEEP_MIN_SECS ({sleep_min_secs})"),
        });
    }

    let timeout_ms = parse_u64("AVISDB_TIMEOUT_MS", "45000")?;
    let headless = parse_bool("AVISDB_HEADLESS", "true")?;
    let storage_state_path = PathBuf::from(or_default(
        "AVISDB_STORAGE_STATE_PATH",
        "./storage_state.json",
    ));
    let debug_dir = PathBuf::from(or_default("AVISDB_DEBUG_DIR", "./debug"));
    let max_fetch_attempts = parse_u32("AVISDB_MAX_FETCH_ATTEMPTS", "3")?;
    let log_level = or_default("AVISDB_LOG_LEVEL", "info");

    Ok(CrawlConfig {
        database_url,
        domain,
        language,
        sort,
        reviewer_type,
        max_pages,
        proxy_pool,
        sleep_min_secs,
        sleep_max_secs,
        timeout_ms,
        headless,
        storage_state_path,
        debug_dir,
        max_fetch_attempts,
        log_level,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
