//! Scripted browser engine and adapter for crawler tests

use crate::adapter::{CategoryDescriptor, PageTurn, RetailerAdapter};
use crate::browser::{BrowserEngine, BrowserError, BrowserLauncher, BrowserResult, BrowserSession};
use crate::product::{ExtractionMethod, Price, RawProductRecord, StandardProductRecord};
use crate::storage::{ProductSink, StorageError, StorageResult};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct SessionCounters {
    opened: AtomicUsize,
    open_now: AtomicUsize,
    peak: AtomicUsize,
}

/// Engine whose sessions only remember the last URL they navigated to
pub(crate) struct ScriptedEngine {
    counters: Arc<SessionCounters>,
    shut_down: AtomicBool,
    failing_sessions: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(SessionCounters::default()),
            shut_down: AtomicBool::new(false),
            failing_sessions: AtomicUsize::new(0),
        }
    }

    /// The next `count` session requests fail
    pub fn failing_sessions(self, count: usize) -> Self {
        self.failing_sessions.store(count, Ordering::SeqCst);
        self
    }

    pub fn sessions_opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_open(&self) -> usize {
        self.counters.open_now.load(Ordering::SeqCst)
    }

    pub fn peak_open_sessions(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserEngine for ScriptedEngine {
    async fn new_session(&self) -> BrowserResult<Box<dyn BrowserSession>> {
        if self
            .failing_sessions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(BrowserError::Protocol("target crashed".to_string()));
        }

        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.counters.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(now, Ordering::SeqCst);

        Ok(Box::new(ScriptedSession {
            counters: Arc::clone(&self.counters),
            current: Mutex::new(None),
            closed: AtomicBool::new(false),
        }))
    }

    async fn shutdown(&self) -> BrowserResult<()> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Launcher handing out a shared [`ScriptedEngine`]
pub(crate) struct ScriptedLauncher {
    engine: Arc<ScriptedEngine>,
}

impl ScriptedLauncher {
    pub fn new(engine: Arc<ScriptedEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    async fn launch(&self) -> BrowserResult<Arc<dyn BrowserEngine>> {
        Ok(self.engine.clone())
    }
}

struct ScriptedSession {
    counters: Arc<SessionCounters>,
    current: Mutex<Option<String>>,
    closed: AtomicBool,
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn goto(&self, url: &str) -> BrowserResult<()> {
        *self.current.lock().unwrap() = Some(url.to_string());
        Ok(())
    }

    async fn reload(&self) -> BrowserResult<()> {
        Ok(())
    }

    async fn content(&self) -> BrowserResult<String> {
        Ok(String::new())
    }

    async fn current_url(&self) -> BrowserResult<Option<String>> {
        Ok(self.current.lock().unwrap().clone())
    }

    async fn click(&self, selector: &str) -> BrowserResult<()> {
        Err(BrowserError::SelectorNotFound(selector.to_string()))
    }

    async fn wait_for_selector(&self, _selector: &str) -> BrowserResult<()> {
        Ok(())
    }

    async fn close(&self) -> BrowserResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.counters.open_now.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Adapter serving fixed listing pages and synthesizing product captures
///
/// Products get `sku` equal to the last path segment. URLs registered as
/// failing raise a navigation error; URLs containing `no-id` capture a name
/// but no identifier. Page turns can be scripted to fail a number of times.
pub(crate) struct ScriptedAdapter {
    pages: Vec<Vec<String>>,
    cursor: AtomicUsize,
    listing_reads: AtomicUsize,
    failing_listings: AtomicUsize,
    failing_products: HashSet<String>,
    panicking_transforms: HashSet<String>,
    failing_turns: AtomicUsize,
    extracted: Mutex<Vec<String>>,
    extract_delay: Duration,
}

impl ScriptedAdapter {
    pub fn with_pages(pages: Vec<Vec<String>>) -> Self {
        Self {
            pages,
            cursor: AtomicUsize::new(0),
            listing_reads: AtomicUsize::new(0),
            failing_listings: AtomicUsize::new(0),
            failing_products: HashSet::new(),
            panicking_transforms: HashSet::new(),
            failing_turns: AtomicUsize::new(0),
            extracted: Mutex::new(Vec::new()),
            extract_delay: Duration::ZERO,
        }
    }

    pub fn products_only() -> Self {
        Self::with_pages(Vec::new())
    }

    /// The first `count` listing reads fail with a navigation error
    pub fn failing_first_listing(self, count: usize) -> Self {
        self.failing_listings.store(count, Ordering::SeqCst);
        self
    }

    pub fn failing_product(mut self, url: &str) -> Self {
        self.failing_products.insert(url.to_string());
        self
    }

    /// `transform` panics for this URL
    pub fn panicking_transform(mut self, url: &str) -> Self {
        self.panicking_transforms.insert(url.to_string());
        self
    }

    /// The next `count` page turns fail with a navigation error
    pub fn failing_next_page(self, count: usize) -> Self {
        self.failing_turns.store(count, Ordering::SeqCst);
        self
    }

    pub fn with_extract_delay(mut self, delay: Duration) -> Self {
        self.extract_delay = delay;
        self
    }

    pub fn listing_reads(&self) -> usize {
        self.listing_reads.load(Ordering::SeqCst)
    }

    /// Product URLs passed to `extract_product`, in call order
    pub fn extracted(&self) -> Vec<String> {
        self.extracted.lock().unwrap().clone()
    }
}

#[async_trait]
impl RetailerAdapter for ScriptedAdapter {
    fn retailer_name(&self) -> &str {
        "scripted"
    }

    fn categories(&self) -> Vec<CategoryDescriptor> {
        vec![CategoryDescriptor::new("All", "https://shop.example/cat/all")]
    }

    async fn extract_product_links(
        &self,
        session: &dyn BrowserSession,
        url: Option<&str>,
    ) -> Result<Vec<String>, BrowserError> {
        self.listing_reads.fetch_add(1, Ordering::SeqCst);

        if self
            .failing_listings
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(BrowserError::Navigation {
                url: url.unwrap_or_default().to_string(),
                message: "connection reset".to_string(),
            });
        }

        if let Some(url) = url {
            session.goto(url).await?;
            self.cursor.store(0, Ordering::SeqCst);
        }

        let page = self.cursor.load(Ordering::SeqCst);
        Ok(self.pages.get(page).cloned().unwrap_or_default())
    }

    async fn next_page(&self, _session: &dyn BrowserSession) -> Result<PageTurn, BrowserError> {
        if self
            .failing_turns
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(BrowserError::Navigation {
                url: "https://shop.example/cat/all?page=next".to_string(),
                message: "connection reset".to_string(),
            });
        }

        let page = self.cursor.load(Ordering::SeqCst);
        if page + 1 < self.pages.len() {
            self.cursor.store(page + 1, Ordering::SeqCst);
            Ok(PageTurn::Advanced)
        } else {
            Ok(PageTurn::Exhausted)
        }
    }

    async fn extract_product(
        &self,
        session: &dyn BrowserSession,
        url: &str,
    ) -> Result<Option<RawProductRecord>, BrowserError> {
        session.goto(url).await?;
        self.extracted.lock().unwrap().push(url.to_string());

        if !self.extract_delay.is_zero() {
            tokio::time::sleep(self.extract_delay).await;
        }

        if self.failing_products.contains(url) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                message: "page crashed".to_string(),
            });
        }

        let segment = url.rsplit('/').next().unwrap_or_default().to_string();
        let mut raw = RawProductRecord::new(url, ExtractionMethod::Structured);
        raw.structured = Some(if url.contains("no-id") {
            json!({"@type": "Product", "name": "Chair"})
        } else {
            json!({"@type": "Product", "name": format!("Product {}", segment), "sku": segment})
        });
        Ok(Some(raw))
    }

    fn transform(&self, raw: &RawProductRecord) -> Option<StandardProductRecord> {
        if self.panicking_transforms.contains(&raw.url) {
            panic!("transform bug on {}", raw.url);
        }
        let name = raw.structured_str("name")?.to_string();
        let product_id = raw.structured_str("sku")?.to_string();
        Some(StandardProductRecord {
            retailer: self.retailer_name().to_string(),
            slug: crate::adapter::slugify(&name),
            product_id,
            name,
            price: Price::Unavailable,
            raw_data: raw.to_raw_data(),
            url: raw.url.clone(),
            description: None,
            image_url: None,
            specifications: None,
        })
    }
}

/// Sink recording stored product ids; ids registered as rejected fail
#[derive(Default)]
pub(crate) struct RecordingSink {
    stored: Mutex<Vec<String>>,
    calls: AtomicUsize,
    rejected: HashSet<String>,
}

impl RecordingSink {
    pub fn rejecting(product_id: &str) -> Self {
        Self {
            rejected: [product_id.to_string()].into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn stored(&self) -> Vec<String> {
        self.stored.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductSink for RecordingSink {
    async fn store(&self, record: &StandardProductRecord) -> StorageResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.rejected.contains(&record.product_id) {
            return Err(StorageError::Unavailable("write rejected".to_string()));
        }
        self.stored.lock().unwrap().push(record.product_id.clone());
        Ok(())
    }
}
