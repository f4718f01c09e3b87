//! CLI commands for slabfolio.
//!
//! Supports the API server mode plus one-shot lookup, add, and list
//! commands against the same configuration and database.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::collection::{CardRepository, SortOrder};
use crate::config::AppConfig;
use crate::scraper::{self, CardRecord, PageCache, RateLimiter};

#[derive(Parser)]
#[command(name = "slabfolio")]
#[command(version, about = "Slabfolio: graded-card collection tracker", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },

    /// Scrape a card page and print the extracted record
    Lookup {
        /// Certificate number printed on the slab
        cert_number: String,

        /// Output format (json, table)
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Ignore cached pages and fetch fresh
        #[arg(long)]
        no_cache: bool,
    },

    /// Scrape a card and store it in a user's collection
    Add {
        username: String,
        cert_number: String,

        /// Ignore cached pages and fetch fresh
        #[arg(long)]
        no_cache: bool,
    },

    /// Print a user's collection
    List {
        username: String,

        /// Only cards carrying this tag
        #[arg(short, long)]
        tag: Option<String>,

        /// Sort order (grade, set_name)
        #[arg(short, long)]
        sort_by: Option<String>,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

/// Run the lookup command.
pub async fn run_lookup(cert_number: String, format: String, no_cache: bool) -> Result<()> {
    init_logging();
    let config = AppConfig::load()?;

    let cache = page_cache(&config, no_cache);
    let limiter = rate_limiter(&config);

    let record =
        scraper::scrape_card(&config.fetcher, &cache, &limiter, cert_number.trim()).await?;
    print_record(&record, &format)?;
    Ok(())
}

/// Run the add command.
pub async fn run_add(username: String, cert_number: String, no_cache: bool) -> Result<()> {
    init_logging();
    let config = AppConfig::load()?;
    let repo = CardRepository::new(Path::new(&config.storage.db_path))?;

    let cert_number = cert_number.trim().to_string();
    anyhow::ensure!(!cert_number.is_empty(), "cert_number must not be empty");
    anyhow::ensure!(
        repo.get_card(&username, &cert_number)?.is_none(),
        "Card already in collection"
    );

    let cache = page_cache(&config, no_cache);
    let limiter = rate_limiter(&config);

    let record = match scraper::scrape_card(&config.fetcher, &cache, &limiter, &cert_number).await
    {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(%cert_number, "scrape failed, storing placeholder: {}", e);
            CardRecord::stub(&cert_number)
        }
    };

    repo.add_card(&username, &record)?;
    println!("Added {} to {}'s collection", record.cert_number, username);
    Ok(())
}

/// Run the list command.
pub fn run_list(
    username: String,
    tag: Option<String>,
    sort_by: Option<String>,
    format: String,
) -> Result<()> {
    let config = AppConfig::load()?;
    let repo = CardRepository::new(Path::new(&config.storage.db_path))?;

    let sort = SortOrder::from_query(sort_by.as_deref());
    let cards = repo.list_cards(&username, tag.as_deref(), sort)?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&cards)?),
        _ => {
            println!(
                "{:<12} {:<24} {:<32} {:<20} {}",
                "CERT", "PLAYER", "SET", "GRADE", "TAGS"
            );
            for card in &cards {
                let tags = card.tags.iter().cloned().collect::<Vec<_>>().join(",");
                println!(
                    "{:<12} {:<24} {:<32} {:<20} {}",
                    card.cert_number, card.player_name, card.set_name, card.grade_label, tags
                );
            }
            println!("{} cards", cards.len());
        }
    }
    Ok(())
}

fn print_record(record: &CardRecord, format: &str) -> Result<()> {
    match format {
        "table" => {
            println!("{:<14} {}", "Cert:", record.cert_number);
            println!("{:<14} {}", "Player:", record.player_name);
            println!("{:<14} {}", "Set:", record.set_name);
            println!("{:<14} {}", "Subset:", record.subset);
            println!("{:<14} {}", "Variation:", record.variation);
            println!("{:<14} {}", "Grade:", record.grade_label);
            println!("{:<14} {}", "Image:", record.image_url);
            println!("{:<14} {}", "Link:", record.source_link);
        }
        _ => println!("{}", serde_json::to_string_pretty(record)?),
    }
    Ok(())
}

pub(crate) fn page_cache(config: &AppConfig, no_cache: bool) -> PageCache {
    // A negative TTL treats every stored page as stale, which is exactly
    // what --no-cache wants; fresh fetches still land in the cache.
    let ttl = if no_cache {
        -1
    } else {
        config.scrape.cache_ttl_hours
    };
    PageCache::new(PathBuf::from(&config.scrape.cache_dir), ttl)
}

pub(crate) fn rate_limiter(config: &AppConfig) -> RateLimiter {
    RateLimiter::new(
        config.scrape.requests_per_minute,
        config.scrape.min_delay_secs,
        config.scrape.max_delay_secs,
    )
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slabfolio=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
