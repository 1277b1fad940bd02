//! Browsing engine abstraction
//!
//! The crawl talks to a browser through three seams:
//! - [`BrowserLauncher`] starts the shared engine once per run
//! - [`BrowserEngine`] is the shared engine; it hands out isolated sessions
//! - [`BrowserSession`] is one cookie/storage partition with a single page
//!
//! Two engines are provided: headless Chromium over the DevTools protocol
//! ([`ChromiumLauncher`]) and plain HTTP sessions with their own cookie jars
//! ([`HttpLauncher`]) for retailers whose listings render without scripts.

mod chromium;
mod http;
pub mod stealth;

pub use chromium::{ChromiumEngine, ChromiumLauncher};
pub use http::{HttpEngine, HttpLauncher};

use crate::browser::stealth::LanguagePrefs;
use crate::config::{BrowserConfig, EngineKind, LocaleConfig};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by browsing engines and sessions
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout { operation: String, after: Duration },

    #[error("No element matches selector '{0}'")]
    SelectorNotFound(String),

    #[error("Invalid selector '{0}'")]
    InvalidSelector(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Browser protocol error: {0}")]
    Protocol(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Browser session is closed")]
    Closed,
}

impl BrowserError {
    /// Whether retrying the same step may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Navigation { .. }
                | Self::Timeout { .. }
                | Self::SelectorNotFound(_)
                | Self::Protocol(_)
                | Self::Http(_)
        )
    }
}

/// Result type for browser operations
pub type BrowserResult<T> = Result<T, BrowserError>;

/// One isolated browsing session holding a single page
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigates to `url` and waits for the document to load
    async fn goto(&self, url: &str) -> BrowserResult<()>;

    /// Reloads the current page
    async fn reload(&self) -> BrowserResult<()>;

    /// Returns the current document's HTML
    async fn content(&self) -> BrowserResult<String>;

    /// Returns the URL of the current document, if any
    async fn current_url(&self) -> BrowserResult<Option<String>>;

    /// Clicks the first element matching `selector`
    async fn click(&self, selector: &str) -> BrowserResult<()>;

    /// Waits until an element matching `selector` is present
    async fn wait_for_selector(&self, selector: &str) -> BrowserResult<()>;

    /// Releases the session's page and cookie partition
    async fn close(&self) -> BrowserResult<()>;
}

/// The shared browsing engine for one run
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Opens a new session with its own cookie/storage partition
    async fn new_session(&self) -> BrowserResult<Box<dyn BrowserSession>>;

    /// Stops the engine; sessions still open become unusable
    async fn shutdown(&self) -> BrowserResult<()>;
}

/// Starts a browsing engine
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> BrowserResult<Arc<dyn BrowserEngine>>;
}

/// Builds the launcher selected by the configuration
///
/// Sessions advertise the locale's language in headers and `navigator.languages`.
pub fn launcher_for(config: &BrowserConfig, locale: &LocaleConfig) -> Box<dyn BrowserLauncher> {
    let languages = LanguagePrefs::new(&locale.language, &locale.country);
    match config.engine {
        EngineKind::Chromium => Box::new(ChromiumLauncher::new(config.clone(), languages)),
        EngineKind::Http => Box::new(HttpLauncher::new(
            Duration::from_secs(config.navigation_timeout_secs),
            languages,
        )),
    }
}

/// Runs `fut` with a timeout, mapping expiry to [`BrowserError::Timeout`]
pub(crate) async fn with_timeout<T, F>(
    operation: &str,
    after: Duration,
    fut: F,
) -> BrowserResult<T>
where
    F: std::future::Future<Output = BrowserResult<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(BrowserError::Timeout {
            operation: operation.to_string(),
            after,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BrowserError::SelectorNotFound(".next".to_string()).is_transient());
        assert!(BrowserError::Timeout {
            operation: "goto".to_string(),
            after: Duration::from_secs(1)
        }
        .is_transient());
        assert!(!BrowserError::Closed.is_transient());
        assert!(!BrowserError::Launch("missing binary".to_string()).is_transient());
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result: BrowserResult<()> = with_timeout("slow step", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        match result {
            Err(BrowserError::Timeout { operation, .. }) => assert_eq!(operation, "slow step"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
