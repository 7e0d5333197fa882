//! Command handlers, called from `main` after config and pool are ready.
//!
//! Crawl-level failures surface through the printed outcome, not the exit
//! path; only setup problems (bad target, unreachable database) propagate.

use anyhow::{anyhow, Context};
use sqlx::SqlitePool;

use avisdb_browser::ChromiumFetcher;
use avisdb_core::{parse_listing_url, validate_asin, CrawlConfig};
use avisdb_scraper::{CrawlOutcome, Crawler, PageDetail};

/// Accepts a bare ASIN or a pasted storefront URL. A URL also overrides
/// the configured domain and any listing parameters it carries.
fn resolve_target(mut config: CrawlConfig, target: &str) -> anyhow::Result<(String, CrawlConfig)> {
    if validate_asin(target) {
        return Ok((target.to_string(), config));
    }
    let parsed = parse_listing_url(target)
        .ok_or_else(|| anyhow!("'{target}' is neither an ASIN nor a recognizable listing URL"))?;
    config.domain = parsed.domain;
    if parsed.language.is_some() {
        config.language = parsed.language;
    }
    if let Some(sort) = parsed.sort {
        config.sort = sort;
    }
    if let Some(reviewer_type) = parsed.reviewer_type {
        config.reviewer_type = reviewer_type;
    }
    Ok((parsed.asin, config))
}

fn print_outcome(outcome: &CrawlOutcome) {
    println!(
        "{}: {} saved, {} duplicates, {} pages{}",
        outcome.asin,
        outcome.total_reviews,
        outcome.total_duplicates,
        outcome.total_pages,
        if outcome.success { "" } else { " (with errors)" },
    );
    for error in &outcome.errors {
        eprintln!("  error: {error}");
    }
}

pub(crate) async fn run_crawl(
    pool: &SqlitePool,
    config: CrawlConfig,
    target: &str,
    max_pages: Option<u32>,
    json: bool,
) -> anyhow::Result<()> {
    let (asin, mut config) = resolve_target(config, target)?;
    if let Some(cap) = max_pages {
        config.max_pages = cap;
    }

    let fetcher = ChromiumFetcher::new(config.clone());
    let mut crawler = Crawler::new(fetcher, pool.clone(), config);

    let mut on_page = |detail: &PageDetail| {
        if !json {
            match &detail.error {
                Some(error) => println!("page {}: failed ({error})", detail.page),
                None => println!(
                    "page {}: {} parsed, {} saved, {} duplicates",
                    detail.page, detail.reviews_parsed, detail.saved, detail.duplicates
                ),
            }
        }
    };
    let outcome = crawler.crawl_asin(&asin, Some(&mut on_page)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

pub(crate) async fn run_batch(
    pool: &SqlitePool,
    mut config: CrawlConfig,
    asins: &[String],
    max_pages: Option<u32>,
) -> anyhow::Result<()> {
    if let Some(cap) = max_pages {
        config.max_pages = cap;
    }
    tracing::info!(products = asins.len(), "batch crawl starting");
    let fetcher = ChromiumFetcher::new(config.clone());
    let mut crawler = Crawler::new(fetcher, pool.clone(), config);

    let outcomes = crawler.crawl_batch(asins).await;
    for outcome in &outcomes {
        print_outcome(outcome);
    }
    let failed = outcomes.iter().filter(|o| !o.success).count();
    println!(
        "batch done: {} of {} products crawled cleanly",
        outcomes.len() - failed,
        outcomes.len()
    );
    Ok(())
}

pub(crate) async fn run_dedupe(pool: &SqlitePool, apply: bool) -> anyhow::Result<()> {
    let report = avisdb_db::reviews::dedupe_reviews(pool, apply)
        .await
        .context("dedupe pass failed")?;
    if apply {
        println!(
            "dedupe: {} redundant rows found, {} deleted",
            report.candidates, report.deleted
        );
    } else {
        println!(
            "dedupe dry-run: {} redundant rows would be deleted (pass --apply)",
            report.candidates
        );
    }
    Ok(())
}

pub(crate) async fn run_reviews(
    pool: &SqlitePool,
    asin: &str,
    limit: Option<i64>,
    json: bool,
) -> anyhow::Result<()> {
    let rows = avisdb_db::reviews::list_reviews_for_asin(pool, asin, limit).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("no stored reviews for {asin}");
        return Ok(());
    }
    for row in &rows {
        println!(
            "[{}] {} {}: {}",
            row.review_date.as_deref().unwrap_or("no date"),
            row.rating.map_or_else(|| "-".to_string(), |r| format!("{r}★")),
            row.review_id,
            row.title.as_deref().unwrap_or("(untitled)"),
        );
    }
    println!("{} reviews for {asin}", rows.len());
    Ok(())
}

pub(crate) async fn run_purge(pool: &SqlitePool, asin: &str) -> anyhow::Result<()> {
    let deleted = avisdb_db::reviews::delete_reviews_for_asin(pool, asin).await?;
    println!("purged {deleted} reviews for {asin}");
    Ok(())
}
