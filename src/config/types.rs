use serde::Deserialize;

/// Main configuration structure for Furnish-Crawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub locale: LocaleConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    pub output: OutputConfig,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Retailer identifier (case-insensitive, e.g. "ikea")
    pub retailer: String,

    /// Category listing to crawl instead of the adapter's default
    #[serde(rename = "category-url", default)]
    pub category_url: Option<String>,

    /// Base pacing delay between sequential page navigations (milliseconds)
    #[serde(rename = "delay-between-requests-ms", default = "default_delay_ms")]
    pub delay_between_requests_ms: u64,

    /// Worker budget for the product pipeline
    #[serde(rename = "max-concurrent-requests", default = "default_concurrency")]
    pub max_concurrent_requests: usize,

    /// Upper bound on listing pages visited per category (unbounded if absent)
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u32>,

    /// Attempts per navigation step before giving up
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff between retry attempts (milliseconds)
    #[serde(rename = "retry-backoff-ms", default = "default_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound of the random addend applied to every pacing delay (milliseconds)
    #[serde(rename = "jitter-ms", default = "default_jitter_ms")]
    pub jitter_ms: u64,

    /// Number of completed products between cache checkpoints
    #[serde(rename = "checkpoint-interval", default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,
}

/// Country and language used to build retailer base URLs
#[derive(Debug, Clone, Deserialize)]
pub struct LocaleConfig {
    #[serde(default = "default_country")]
    pub country: String,

    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            country: default_country(),
            language: default_language(),
        }
    }
}

/// Which browsing engine backs the crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Headless Chromium driven over the DevTools protocol
    Chromium,
    /// Plain HTTP sessions with per-session cookie jars (no script execution)
    Http,
}

/// Browsing engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_engine")]
    pub engine: EngineKind,

    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Timeout applied to every navigation and selector wait (seconds)
    #[serde(rename = "navigation-timeout-secs", default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Chrome/Chromium binary; auto-detected when absent
    #[serde(default)]
    pub executable: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            headless: default_headless(),
            navigation_timeout_secs: default_navigation_timeout(),
            executable: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the crawl cache file
    #[serde(rename = "cache-location")]
    pub cache_location: String,

    /// Path to the SQLite product database
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory receiving per-run artifacts
    #[serde(rename = "artifacts-dir", default = "default_artifacts_dir")]
    pub artifacts_dir: String,
}

fn default_delay_ms() -> u64 {
    1500
}

fn default_concurrency() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    2000
}

fn default_jitter_ms() -> u64 {
    1000
}

fn default_checkpoint_interval() -> usize {
    10
}

fn default_country() -> String {
    "us".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_engine() -> EngineKind {
    EngineKind::Chromium
}

fn default_headless() -> bool {
    true
}

fn default_navigation_timeout() -> u64 {
    30
}

fn default_artifacts_dir() -> String {
    "./runs".to_string()
}
