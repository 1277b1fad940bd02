//! Run orchestration
//!
//! One run crawls one category of one retailer:
//! 1. Resolve the adapter and the target category
//! 2. Load the crawl cache
//! 3. Launch the browsing engine
//! 4. Collect product links from the paginated listing
//! 5. Skip links already in the cache
//! 6. Process the rest through the product pipeline, storing each record
//! 7. Merge successes into the cache and persist it
//! 8. Write the run summary and artifacts

use crate::adapter::{resolve_adapter, AdapterOptions, RetailerAdapter};
use crate::browser::{launcher_for, BrowserEngine, BrowserLauncher};
use crate::cache::CrawlCache;
use crate::config::Config;
use crate::crawler::collector::{CollectedLinks, LinkCollector};
use crate::crawler::pacing::Pacing;
use crate::crawler::pipeline::{
    LoggingObserver, PipelineObserver, PipelineOptions, ProductPipeline, Progress,
};
use crate::crawler::retry::RetryPolicy;
use crate::output::{FailedUrl, RunArtifacts, RunSummary};
use crate::product::StandardProductRecord;
use crate::storage::{open_sink, ProductSink};
use crate::{ConfigError, CrawlError};
use chrono::Utc;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use url::Url;
use uuid::Uuid;

/// Wires adapter, browser, cache, pipeline and sink into complete runs
///
/// The orchestrator owns the storage sink for its lifetime and launches a
/// fresh browsing engine for every run, shutting it down when the run ends.
pub struct Orchestrator {
    config: Config,
    config_hash: String,
    launcher: Box<dyn BrowserLauncher>,
    sink: Arc<dyn ProductSink>,
}

impl Orchestrator {
    /// Creates an orchestrator writing through `sink`
    pub fn new(config: Config, config_hash: impl Into<String>, sink: Arc<dyn ProductSink>) -> Self {
        let launcher = launcher_for(&config.browser, &config.locale);
        Self {
            config,
            config_hash: config_hash.into(),
            launcher,
            sink,
        }
    }

    /// Creates an orchestrator storing into the configured SQLite database
    pub fn from_config(config: Config, config_hash: impl Into<String>) -> Result<Self, CrawlError> {
        let sink = open_sink(Path::new(&config.output.database_path))?;
        Ok(Self::new(config, config_hash, Arc::new(sink)))
    }

    /// Replaces the browser launcher chosen from the configuration
    pub fn with_launcher(mut self, launcher: Box<dyn BrowserLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs one crawl for `retailer`
    ///
    /// # Arguments
    ///
    /// * `retailer` - Retailer identifier, matched case-insensitively
    /// * `category_override` - Listing to crawl; falls back to `category-url` from the
    ///   configuration, then to the adapter's first category
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - The run finished, possibly with per-product failures
    /// * `Err(CrawlError)` - Configuration error, or the browser could not be launched
    pub async fn run(
        &self,
        retailer: &str,
        category_override: Option<&str>,
    ) -> Result<RunSummary, CrawlError> {
        let adapter = resolve_adapter(retailer, &self.adapter_options())?;
        let category = category_override.or(self.config.crawler.category_url.as_deref());
        self.run_with_adapter(adapter, category).await
    }

    /// Runs one crawl with an already constructed adapter
    pub async fn run_with_adapter(
        &self,
        adapter: Arc<dyn RetailerAdapter>,
        category_override: Option<&str>,
    ) -> Result<RunSummary, CrawlError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();
        let category_url = resolve_category(adapter.as_ref(), category_override)?;
        let retailer = adapter.retailer_name().to_string();

        tracing::info!("Starting {} crawl of {}", retailer, category_url);

        let cache = Arc::new(Mutex::new(CrawlCache::load(&self.config.output.cache_location)));
        let artifacts = match RunArtifacts::create(
            Path::new(&self.config.output.artifacts_dir),
            &retailer,
            started_at,
            run_id,
        ) {
            Ok(artifacts) => Some(Arc::new(artifacts)),
            Err(e) => {
                tracing::warn!("Run artifacts disabled: {}", e);
                None
            }
        };

        let engine = self.launcher.launch().await?;
        let outcome = self
            .crawl(adapter, Arc::clone(&engine), &category_url, &cache, artifacts.clone())
            .await;

        if let Err(e) = engine.shutdown().await {
            tracing::warn!("Browser shutdown failed: {}", e);
        }

        let stats = outcome?;
        let elapsed = started.elapsed();
        let summary = RunSummary {
            run_id,
            retailer,
            category_url,
            started_at,
            finished_at: Utc::now(),
            links_found: stats.links.urls.len(),
            duplicates_removed: stats.links.duplicates_removed,
            pages_visited: stats.links.pages_visited,
            already_cached: stats.already_cached,
            attempted: stats.attempted,
            succeeded: stats.succeeded,
            failed: stats.failures.len(),
            elapsed_secs: elapsed.as_secs_f64(),
            rate_per_sec: if elapsed.as_secs_f64() > 0.0 {
                stats.attempted as f64 / elapsed.as_secs_f64()
            } else {
                0.0
            },
            config_hash: self.config_hash.clone(),
            failures: stats.failures,
        };

        if let Err(e) = self.sink.record_run(&summary).await {
            tracing::warn!("Failed to record run {}: {}", summary.run_id, e);
        }
        if let Some(artifacts) = &artifacts {
            match artifacts.write_summary(&summary) {
                Ok(()) => tracing::info!("Run artifacts written to {}", artifacts.dir().display()),
                Err(e) => tracing::warn!("Failed to write run summary: {}", e),
            }
        }

        tracing::info!(
            "Crawl finished: {} stored, {} failed, {} skipped as cached in {:.1}s",
            summary.succeeded,
            summary.failed,
            summary.already_cached,
            summary.elapsed_secs
        );

        Ok(summary)
    }

    async fn crawl(
        &self,
        adapter: Arc<dyn RetailerAdapter>,
        engine: Arc<dyn BrowserEngine>,
        category_url: &str,
        cache: &Arc<Mutex<CrawlCache>>,
        artifacts: Option<Arc<RunArtifacts>>,
    ) -> Result<CrawlStats, CrawlError> {
        let links = self.collect_links(adapter.as_ref(), engine.as_ref(), category_url).await;
        if let Some(artifacts) = &artifacts {
            if let Err(e) = artifacts.write_links(&links.urls) {
                tracing::warn!("Failed to write link list: {}", e);
            }
        }

        let (cached, to_process): (Vec<String>, Vec<String>) = {
            let cache = cache.lock().unwrap_or_else(|e| e.into_inner());
            links.urls.iter().cloned().partition(|url| cache.contains(url))
        };
        tracing::info!(
            "{} product links found, {} already cached, {} to process",
            links.urls.len(),
            cached.len(),
            to_process.len()
        );

        let observer = Arc::new(RunObserver {
            cache: Arc::clone(cache),
            artifacts,
            failures: Mutex::new(Vec::new()),
        });
        let attempted = to_process.len();
        let records = ProductPipeline::new(self.pipeline_options())
            .process(
                adapter,
                engine,
                Arc::clone(&self.sink),
                to_process,
                Arc::clone(&observer) as Arc<dyn PipelineObserver>,
            )
            .await?;

        {
            let mut cache = cache.lock().unwrap_or_else(|e| e.into_inner());
            cache.extend(records.iter().map(|record| record.url.as_str()));
            if let Err(e) = cache.save() {
                tracing::warn!("Failed to persist crawl cache: {}", e);
            }
        }

        let failures = std::mem::take(&mut *observer.failures.lock().unwrap_or_else(|e| e.into_inner()));
        Ok(CrawlStats {
            links,
            already_cached: cached.len(),
            attempted,
            succeeded: records.len(),
            failures,
        })
    }

    async fn collect_links(
        &self,
        adapter: &dyn RetailerAdapter,
        engine: &dyn BrowserEngine,
        category_url: &str,
    ) -> CollectedLinks {
        let session = match engine.new_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Could not open a listing session for {}: {}", category_url, e);
                return CollectedLinks::default();
            }
        };
        let collector = LinkCollector::new(self.retry_policy(), self.listing_pacing());
        let links = collector
            .collect(adapter, session.as_ref(), category_url, self.config.crawler.max_pages)
            .await;

        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close listing session: {}", e);
        }
        links
    }

    fn adapter_options(&self) -> AdapterOptions {
        AdapterOptions {
            country: self.config.locale.country.clone(),
            language: self.config.locale.language.clone(),
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.config.crawler.max_retries,
            Duration::from_millis(self.config.crawler.retry_backoff_ms),
        )
    }

    /// Pacing between listing pages
    fn listing_pacing(&self) -> Pacing {
        Pacing::new(
            Duration::from_millis(self.config.crawler.delay_between_requests_ms),
            Duration::from_millis(self.config.crawler.jitter_ms),
        )
    }

    fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            concurrency: self.config.crawler.max_concurrent_requests,
            pacing: Pacing::new(Duration::ZERO, Duration::from_millis(self.config.crawler.jitter_ms)),
            extraction_retry: self.retry_policy(),
            checkpoint_interval: self.config.crawler.checkpoint_interval,
        }
    }
}

struct CrawlStats {
    links: CollectedLinks,
    already_cached: usize,
    attempted: usize,
    succeeded: usize,
    failures: Vec<FailedUrl>,
}

/// Picks the override when given, otherwise the adapter's first category
fn resolve_category(
    adapter: &dyn RetailerAdapter,
    category_override: Option<&str>,
) -> Result<String, ConfigError> {
    match category_override {
        Some(url) => {
            let parsed = Url::parse(url.trim())
                .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", url, e)))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(ConfigError::InvalidUrl(format!(
                    "{}: category URL must be http(s)",
                    url
                )));
            }
            Ok(parsed.to_string())
        }
        None => adapter
            .categories()
            .into_iter()
            .next()
            .map(|category| category.url)
            .ok_or_else(|| ConfigError::NoCategory {
                retailer: adapter.retailer_name().to_string(),
            }),
    }
}

/// Records successes in the cache and artifacts while the pipeline runs
struct RunObserver {
    cache: Arc<Mutex<CrawlCache>>,
    artifacts: Option<Arc<RunArtifacts>>,
    failures: Mutex<Vec<FailedUrl>>,
}

impl PipelineObserver for RunObserver {
    fn on_success(&self, record: &StandardProductRecord, index: usize) {
        LoggingObserver.on_success(record, index);
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(&record.url);

        if let Some(artifacts) = &self.artifacts {
            if let Err(e) = artifacts.append_product(record) {
                tracing::warn!("Failed to append {} to artifacts: {}", record.url, e);
            }
        }
    }

    fn on_failure(&self, url: &str, error: &CrawlError, index: usize) {
        LoggingObserver.on_failure(url, error, index);
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(FailedUrl {
                url: url.to_string(),
                error: error.to_string(),
            });
    }

    fn on_progress(&self, progress: &Progress) {
        LoggingObserver.on_progress(progress);
    }

    fn on_checkpoint(&self, progress: &Progress) {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        match cache.save() {
            Ok(()) => tracing::debug!(
                completed = progress.completed,
                "Checkpointed {} cached URLs",
                cache.len()
            ),
            Err(e) => tracing::warn!("Cache checkpoint failed: {}", e),
        }
    }
}
