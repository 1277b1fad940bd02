//! Furnish-Crawl main entry point
//!
//! This is the command-line interface for the furniture retailer crawler.

use anyhow::Context;
use clap::{Parser, Subcommand};
use furnish_crawl::adapter::{resolve_adapter, supported_retailers, AdapterOptions};
use furnish_crawl::cache::CrawlCache;
use furnish_crawl::config::{load_config, load_config_with_hash, Config};
use furnish_crawl::crawler::crawl;
use furnish_crawl::output::{print_categories, print_summary};
use furnish_crawl::storage::open_sink;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Furnish-Crawl: a furniture retailer product crawler
///
/// Furnish-Crawl walks a retailer's category listings in a headless browser,
/// extracts every product it finds and stores standardized records in SQLite.
/// Products crawled by earlier runs are skipped.
#[derive(Parser, Debug)]
#[command(name = "furnish-crawl")]
#[command(version = "1.0.0")]
#[command(about = "A furniture retailer product crawler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl one category of a retailer
    Crawl {
        /// Path to TOML configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Retailer to crawl instead of the configured one
        #[arg(long)]
        retailer: Option<String>,

        /// Category listing URL to crawl instead of the retailer's default
        #[arg(long)]
        category_url: Option<String>,
    },

    /// List the default categories of a retailer
    Categories {
        /// Retailer identifier
        retailer: String,

        /// Two-letter country code used to build category URLs
        #[arg(long, default_value = "us")]
        country: String,

        /// Two-letter language code used to build category URLs
        #[arg(long, default_value = "en")]
        language: String,
    },

    /// List supported retailers
    Retailers,

    /// Show product counts from the database
    Stats {
        /// Path to TOML configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },

    /// Inspect or reset the crawl cache
    Cache {
        /// Path to TOML configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Print the cached product URLs
    Show,
    /// Forget every cached URL so the next run processes all products
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Crawl {
            config,
            retailer,
            category_url,
        } => handle_crawl(&config, retailer, category_url).await,
        Command::Categories {
            retailer,
            country,
            language,
        } => handle_categories(&retailer, country, language),
        Command::Retailers => {
            for retailer in supported_retailers() {
                println!("{}", retailer);
            }
            Ok(())
        }
        Command::Stats { config } => handle_stats(&load(&config)?),
        Command::Cache { config, action } => handle_cache(&load(&config)?, action),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("furnish_crawl=info,warn"),
            1 => EnvFilter::new("furnish_crawl=debug,info"),
            2 => EnvFilter::new("furnish_crawl=trace,chromiumoxide=info,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn load(path: &Path) -> anyhow::Result<Config> {
    tracing::info!("Loading configuration from: {}", path.display());
    load_config(path).with_context(|| format!("failed to load {}", path.display()))
}

/// Handles the crawl subcommand
async fn handle_crawl(
    path: &Path,
    retailer: Option<String>,
    category_url: Option<String>,
) -> anyhow::Result<()> {
    let (mut config, config_hash) = load_config_with_hash(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(retailer) = retailer {
        config.crawler.retailer = retailer;
    }

    let summary = crawl(config, config_hash, category_url.as_deref())
        .await
        .context("crawl failed")?;

    print_summary(&summary);
    Ok(())
}

/// Handles the categories subcommand
fn handle_categories(retailer: &str, country: String, language: String) -> anyhow::Result<()> {
    let adapter = resolve_adapter(retailer, &AdapterOptions { country, language })?;
    print_categories(adapter.retailer_name(), &adapter.categories());
    Ok(())
}

/// Handles the stats subcommand
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let sink = open_sink(Path::new(&config.output.database_path))?;
    for retailer in supported_retailers() {
        println!("  {:<10} {}", retailer, sink.count_products(Some(retailer))?);
    }
    println!("  {:<10} {}", "total", sink.count_products(None)?);
    println!("\nRuns recorded: {}", sink.count_runs()?);

    Ok(())
}

/// Handles the cache subcommands
fn handle_cache(config: &Config, action: CacheAction) -> anyhow::Result<()> {
    let mut cache = CrawlCache::load(&config.output.cache_location);

    match action {
        CacheAction::Show => {
            for url in cache.urls() {
                println!("{}", url);
            }
            println!("\n{} cached URLs in {}", cache.len(), cache.path().display());
        }
        CacheAction::Clear => {
            let removed = cache.len();
            cache.clear();
            cache
                .save()
                .with_context(|| format!("failed to rewrite {}", cache.path().display()))?;
            println!("✓ Removed {} cached URLs", removed);
        }
    }

    Ok(())
}
