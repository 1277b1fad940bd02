//! Concurrency-bounded product pipeline
//!
//! Each product URL is one unit of work: open an isolated session, pause,
//! extract (retrying transient failures), transform, hand the record to the
//! sink, close the session. Units are submitted in input order and at most
//! `concurrency` of them hold a session at any moment. Individual failures
//! are reported through the [`PipelineObserver`] and never abort the batch.

use crate::adapter::RetailerAdapter;
use crate::browser::{BrowserEngine, BrowserError, BrowserSession};
use crate::crawler::pacing::Pacing;
use crate::crawler::retry::{retry, RetryPolicy};
use crate::product::StandardProductRecord;
use crate::storage::ProductSink;
use crate::CrawlError;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Running counters reported after every completed unit
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
    pub success: usize,
    pub failure: usize,
    pub elapsed: Duration,
    /// Completed units per second
    pub rate: f64,
    pub estimated_remaining: Option<Duration>,
}

impl Progress {
    fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            success: 0,
            failure: 0,
            elapsed: Duration::ZERO,
            rate: 0.0,
            estimated_remaining: None,
        }
    }

    fn record(&mut self, succeeded: bool, elapsed: Duration) {
        self.completed += 1;
        if succeeded {
            self.success += 1;
        } else {
            self.failure += 1;
        }
        self.elapsed = elapsed;

        let secs = elapsed.as_secs_f64();
        self.rate = if secs > 0.0 {
            self.completed as f64 / secs
        } else {
            0.0
        };
        self.estimated_remaining = (self.rate > 0.0)
            .then(|| Duration::from_secs_f64((self.total - self.completed) as f64 / self.rate));
    }
}

/// Side channel for per-unit outcomes
///
/// Callbacks run on worker tasks, concurrently and in completion order.
pub trait PipelineObserver: Send + Sync {
    /// A record was produced and accepted by the sink
    fn on_success(&self, _record: &StandardProductRecord, _index: usize) {}

    /// The unit at submission position `index` produced no stored record
    fn on_failure(&self, _url: &str, _error: &CrawlError, _index: usize) {}

    fn on_progress(&self, _progress: &Progress) {}

    /// Called every `checkpoint_interval` completed units
    fn on_checkpoint(&self, _progress: &Progress) {}
}

/// Observer that only logs
pub struct LoggingObserver;

impl PipelineObserver for LoggingObserver {
    fn on_success(&self, record: &StandardProductRecord, index: usize) {
        tracing::debug!(index, product_id = %record.product_id, "Stored {}", record.name);
    }

    fn on_failure(&self, url: &str, error: &CrawlError, index: usize) {
        tracing::warn!(index, "Product {} failed: {}", url, error);
    }

    fn on_progress(&self, progress: &Progress) {
        tracing::debug!(
            completed = progress.completed,
            total = progress.total,
            "Pipeline progress"
        );
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Maximum number of units holding a session at once
    pub concurrency: usize,
    /// Delay applied inside each unit before extraction
    pub pacing: Pacing,
    /// Retry budget for one product extraction
    pub extraction_retry: RetryPolicy,
    /// Completed units between checkpoint callbacks
    pub checkpoint_interval: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            pacing: Pacing::new(Duration::from_millis(500), Duration::from_millis(1000)),
            extraction_retry: RetryPolicy::default(),
            checkpoint_interval: 10,
        }
    }
}

struct Shared {
    adapter: Arc<dyn RetailerAdapter>,
    engine: Arc<dyn BrowserEngine>,
    sink: Arc<dyn ProductSink>,
    observer: Arc<dyn PipelineObserver>,
    options: PipelineOptions,
    progress: Mutex<Progress>,
    results: Mutex<Vec<StandardProductRecord>>,
    started: Instant,
}

pub struct ProductPipeline {
    options: PipelineOptions,
}

impl ProductPipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Processes `urls`, returning the stored records in completion order
    ///
    /// # Arguments
    ///
    /// * `adapter` - Extracts and transforms each product page
    /// * `engine` - Shared engine; every unit opens its own session on it
    /// * `sink` - Receives each record as soon as it is transformed
    /// * `urls` - Product URLs, submitted in this order
    /// * `observer` - Receives per-unit outcomes and progress
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<StandardProductRecord>)` - Records the sink accepted
    /// * `Err(CrawlError::InvalidConcurrency)` - `concurrency` is zero
    pub async fn process(
        &self,
        adapter: Arc<dyn RetailerAdapter>,
        engine: Arc<dyn BrowserEngine>,
        sink: Arc<dyn ProductSink>,
        urls: Vec<String>,
        observer: Arc<dyn PipelineObserver>,
    ) -> Result<Vec<StandardProductRecord>, CrawlError> {
        if self.options.concurrency == 0 {
            return Err(CrawlError::InvalidConcurrency(0));
        }
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!(
            "Processing {} products with concurrency {}",
            urls.len(),
            self.options.concurrency
        );

        let shared = Arc::new(Shared {
            adapter,
            engine,
            sink,
            observer,
            options: self.options.clone(),
            progress: Mutex::new(Progress::new(urls.len())),
            results: Mutex::new(Vec::with_capacity(urls.len())),
            started: Instant::now(),
        });
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency));
        let mut tasks = JoinSet::new();

        for (index, url) in urls.into_iter().enumerate() {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| CrawlError::Worker(e.to_string()))?;
            let shared = Arc::clone(&shared);

            tasks.spawn(async move {
                let outcome = run_unit(&shared, &url).await;
                drop(permit);
                report(&shared, &url, index, outcome);
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Product worker panicked: {}", e);
            }
        }

        let results = std::mem::take(&mut *shared.results.lock().unwrap_or_else(|e| e.into_inner()));
        Ok(results)
    }
}

/// One unit of work; the session is closed on every path
///
/// A panic inside the adapter or sink becomes a [`CrawlError::Worker`] for
/// this unit, so it is still closed and reported like any other failure.
async fn run_unit(shared: &Shared, url: &str) -> Result<StandardProductRecord, CrawlError> {
    let session = shared.engine.new_session().await?;
    let outcome = AssertUnwindSafe(extract_and_store(shared, session.as_ref(), url))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            Err(CrawlError::Worker(format!(
                "processing {} panicked: {}",
                url,
                panic_message(panic.as_ref())
            )))
        });

    if let Err(e) = session.close().await {
        tracing::warn!("Failed to close session for {}: {}", url, e);
    }

    outcome
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

async fn extract_and_store(
    shared: &Shared,
    session: &dyn BrowserSession,
    url: &str,
) -> Result<StandardProductRecord, CrawlError> {
    shared.options.pacing.pause().await;

    let adapter = shared.adapter.as_ref();
    let raw = retry(
        &shared.options.extraction_retry,
        "product extraction",
        BrowserError::is_transient,
        |_| adapter.extract_product(session, url),
    )
    .await
    .map_err(|e| CrawlError::Extraction {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let record = raw
        .as_ref()
        .and_then(|raw| adapter.transform(raw))
        .ok_or_else(|| CrawlError::Transform {
            url: url.to_string(),
        })?;

    if let Err(e) = shared.sink.store(&record).await {
        tracing::error!(
            code = e.code(),
            hint = e.hint().unwrap_or(""),
            "Failed to store {}/{}: {}",
            record.retailer,
            record.product_id,
            e.details()
        );
        return Err(e.into());
    }

    Ok(record)
}

fn report(
    shared: &Shared,
    url: &str,
    index: usize,
    outcome: Result<StandardProductRecord, CrawlError>,
) {
    let snapshot = {
        let mut progress = shared.progress.lock().unwrap_or_else(|e| e.into_inner());
        progress.record(outcome.is_ok(), shared.started.elapsed());
        progress.clone()
    };

    match outcome {
        Ok(record) => {
            shared.observer.on_success(&record, index);
            shared
                .results
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(record);
        }
        Err(e) => shared.observer.on_failure(url, &e, index),
    }

    shared.observer.on_progress(&snapshot);

    let interval = shared.options.checkpoint_interval;
    if interval > 0 && snapshot.completed % interval == 0 && snapshot.completed < snapshot.total {
        tracing::info!(
            "Progress: {}/{} products ({} ok, {} failed), {:.2}/sec",
            snapshot.completed,
            snapshot.total,
            snapshot.success,
            snapshot.failure,
            snapshot.rate
        );
        shared.observer.on_checkpoint(&snapshot);
    }
}
