//! Furnish-Crawl: a furniture retailer product crawler
//!
//! This crate drives a headless browser across retailer category listings,
//! extracts product attributes through per-retailer adapters, and persists
//! standardized product records. A local crawl cache makes re-runs incremental.

pub mod adapter;
pub mod browser;
pub mod cache;
pub mod config;
pub mod crawler;
pub mod output;
pub mod product;
pub mod storage;
pub mod trigger;
pub mod url;

use thiserror::Error;

/// Main error type for crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Browser error: {0}")]
    Browser(#[from] browser::BrowserError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Extraction failed for {url}: {message}")]
    Extraction { url: String, message: String },

    #[error("Transformation produced no record for {url}")]
    Transform { url: String },

    #[error("Concurrency must be at least 1, got {0}")]
    InvalidConcurrency(usize),

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Unsupported retailer '{name}' (supported: {supported})")]
    UnsupportedRetailer { name: String, supported: String },

    #[error("No category available for retailer '{retailer}' and no category URL given")]
    NoCategory { retailer: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

// Re-export commonly used types
pub use adapter::{resolve_adapter, CategoryDescriptor, PageTurn, RetailerAdapter};
pub use config::Config;
pub use crawler::Orchestrator;
pub use output::RunSummary;
pub use product::{Price, RawProductRecord, StandardProductRecord};
