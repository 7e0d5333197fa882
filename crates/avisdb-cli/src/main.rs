use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "avisdb")]
#[command(about = "Product review harvester and review database")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Crawl reviews for one product, given an ASIN or a pasted listing URL.
    Crawl {
        /// ASIN (10 alphanumerics) or a review-listing / product URL.
        target: String,
        /// Override the configured page cap.
        #[arg(long)]
        max_pages: Option<u32>,
        /// Emit the crawl outcome as JSON instead of a text summary.
        #[arg(long)]
        json: bool,
    },
    /// Crawl several ASINs sequentially, one session each.
    Batch {
        /// ASINs to crawl, in order.
        #[arg(required = true)]
        asins: Vec<String>,
        #[arg(long)]
        max_pages: Option<u32>,
    },
    /// Collapse stored rows that describe the same review.
    Dedupe {
        /// Actually delete; without this flag only a dry-run count is shown.
        #[arg(long)]
        apply: bool,
    },
    /// List stored reviews for one ASIN.
    Reviews {
        asin: String,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        json: bool,
    },
    /// Delete all stored reviews for one ASIN.
    Purge { asin: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = avisdb_core::load_crawl_config()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let pool = avisdb_db::connect_pool(&config.database_url).await?;
    avisdb_db::ping(&pool).await?;
    avisdb_db::run_migrations(&pool).await?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Crawl {
            target,
            max_pages,
            json,
        } => commands::run_crawl(&pool, config, &target, max_pages, json).await,
        Commands::Batch { asins, max_pages } => {
            commands::run_batch(&pool, config, &asins, max_pages).await
        }
        Commands::Dedupe { apply } => commands::run_dedupe(&pool, apply).await,
        Commands::Reviews { asin, limit, json } => {
            commands::run_reviews(&pool, &asin, limit, json).await
        }
        Commands::Purge { asin } => commands::run_purge(&pool, &asin).await,
    }
}
