//! Plain HTTP browsing engine
//!
//! Sessions are independent `reqwest` clients, each with its own cookie jar
//! and user agent. Pages are fetched but never scripted: clicking follows the
//! matched element's `href`, and selector waits check the fetched document once.

use crate::browser::stealth::{random_user_agent, LanguagePrefs};
use crate::browser::{
    with_timeout, BrowserEngine, BrowserError, BrowserLauncher, BrowserResult, BrowserSession,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use scraper::{Html, Selector};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Starts the HTTP engine (no external process involved)
pub struct HttpLauncher {
    timeout: Duration,
    languages: LanguagePrefs,
}

impl HttpLauncher {
    pub fn new(timeout: Duration, languages: LanguagePrefs) -> Self {
        Self { timeout, languages }
    }
}

#[async_trait]
impl BrowserLauncher for HttpLauncher {
    async fn launch(&self) -> BrowserResult<Arc<dyn BrowserEngine>> {
        Ok(Arc::new(HttpEngine::new(self.timeout, self.languages.clone())))
    }
}

/// Engine handing out cookie-isolated HTTP sessions
pub struct HttpEngine {
    timeout: Duration,
    languages: LanguagePrefs,
    shut_down: AtomicBool,
}

impl HttpEngine {
    pub fn new(timeout: Duration, languages: LanguagePrefs) -> Self {
        Self {
            timeout,
            languages,
            shut_down: AtomicBool::new(false),
        }
    }
}

/// Builds a client with its own cookie store and a rotated user agent
fn build_session_client(
    timeout: Duration,
    languages: &LanguagePrefs,
) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_str(&languages.accept_language())
            .unwrap_or_else(|_| HeaderValue::from_static("en-US,en;q=0.9")),
    );

    Client::builder()
        .user_agent(random_user_agent())
        .default_headers(headers)
        .cookie_store(true)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

#[async_trait]
impl BrowserEngine for HttpEngine {
    async fn new_session(&self) -> BrowserResult<Box<dyn BrowserSession>> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(BrowserError::Closed);
        }

        Ok(Box::new(HttpSession {
            client: build_session_client(self.timeout, &self.languages)?,
            timeout: self.timeout,
            page: Mutex::new(LoadedPage::default()),
            closed: AtomicBool::new(false),
        }))
    }

    async fn shutdown(&self) -> BrowserResult<()> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
struct LoadedPage {
    url: Option<Url>,
    body: String,
}

/// One cookie jar plus the most recently loaded document
struct HttpSession {
    client: Client,
    timeout: Duration,
    page: Mutex<LoadedPage>,
    closed: AtomicBool,
}

impl HttpSession {
    fn ensure_open(&self) -> BrowserResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrowserError::Closed);
        }
        Ok(())
    }

    fn snapshot(&self) -> LoadedPage {
        self.page
            .lock()
            .map(|page| page.clone())
            .unwrap_or_default()
    }

    async fn fetch(&self, url: &str) -> BrowserResult<()> {
        let response = with_timeout("goto", self.timeout, async {
            self.client
                .get(url)
                .send()
                .await
                .map_err(|e| BrowserError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        let final_url = response.url().clone();
        let body = response.text().await?;

        if let Ok(mut page) = self.page.lock() {
            page.url = Some(final_url);
            page.body = body;
        }
        Ok(())
    }
}

/// Finds the navigation target of the first element matching `selector`
fn link_target(body: &str, base: Option<&Url>, selector: &str) -> BrowserResult<String> {
    let parsed =
        Selector::parse(selector).map_err(|_| BrowserError::InvalidSelector(selector.to_string()))?;
    let document = Html::parse_document(body);
    let element = document
        .select(&parsed)
        .next()
        .ok_or_else(|| BrowserError::SelectorNotFound(selector.to_string()))?;

    let href = element
        .value()
        .attr("href")
        .or_else(|| element.value().attr("data-href"))
        .ok_or_else(|| {
            BrowserError::Unsupported(format!(
                "element matching '{}' has no href; script-driven controls need the chromium engine",
                selector
            ))
        })?;

    match base {
        Some(base) => base
            .join(href)
            .map(String::from)
            .map_err(|e| BrowserError::Navigation {
                url: href.to_string(),
                message: e.to_string(),
            }),
        None => Ok(href.to_string()),
    }
}

fn has_match(body: &str, selector: &str) -> BrowserResult<bool> {
    let parsed =
        Selector::parse(selector).map_err(|_| BrowserError::InvalidSelector(selector.to_string()))?;
    let document = Html::parse_document(body);
    let found = document.select(&parsed).next().is_some();
    Ok(found)
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn goto(&self, url: &str) -> BrowserResult<()> {
        self.ensure_open()?;
        self.fetch(url).await
    }

    async fn reload(&self) -> BrowserResult<()> {
        self.ensure_open()?;
        let url = self
            .snapshot()
            .url
            .ok_or_else(|| BrowserError::Unsupported("reload before any navigation".to_string()))?;
        self.fetch(url.as_str()).await
    }

    async fn content(&self) -> BrowserResult<String> {
        self.ensure_open()?;
        Ok(self.snapshot().body)
    }

    async fn current_url(&self) -> BrowserResult<Option<String>> {
        self.ensure_open()?;
        Ok(self.snapshot().url.map(String::from))
    }

    async fn click(&self, selector: &str) -> BrowserResult<()> {
        self.ensure_open()?;
        let page = self.snapshot();
        let target = link_target(&page.body, page.url.as_ref(), selector)?;
        self.fetch(&target).await
    }

    async fn wait_for_selector(&self, selector: &str) -> BrowserResult<()> {
        self.ensure_open()?;
        if has_match(&self.snapshot().body, selector)? {
            Ok(())
        } else {
            Err(BrowserError::SelectorNotFound(selector.to_string()))
        }
    }

    async fn close(&self) -> BrowserResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
