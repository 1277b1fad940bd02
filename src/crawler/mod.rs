//! Crawler module for category and product crawling
//!
//! This module contains the core crawling logic, including:
//! - Paginated product link collection
//! - The bounded-concurrency product pipeline
//! - Retry with exponential backoff and jittered pacing
//! - Overall run orchestration

mod collector;
mod orchestrator;
mod pacing;
mod pipeline;
mod retry;

#[cfg(test)]
mod testing;

pub use collector::{CollectedLinks, LinkCollector};
pub use orchestrator::Orchestrator;
pub use pacing::Pacing;
pub use pipeline::{
    LoggingObserver, PipelineObserver, PipelineOptions, ProductPipeline, Progress,
};
pub use retry::{retry, RetryPolicy};

use crate::config::Config;
use crate::output::RunSummary;
use crate::CrawlError;

/// Runs a complete crawl of one retailer category
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the SQLite product store
/// 2. Launch the configured browsing engine
/// 3. Collect and deduplicate product links
/// 4. Extract, transform and store every uncached product
/// 5. Update the crawl cache and write the run summary
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the configuration file, recorded with the run
/// * `category_url` - Optional listing overriding the configured category
pub async fn crawl(
    config: Config,
    config_hash: String,
    category_url: Option<&str>,
) -> Result<RunSummary, CrawlError> {
    let retailer = config.crawler.retailer.clone();
    let orchestrator = Orchestrator::from_config(config, config_hash)?;
    orchestrator.run(&retailer, category_url).await
}
