//! Headless Chromium engine driven over the DevTools protocol
//!
//! One Chromium process is shared by the whole run. Every session lives in its
//! own browser context, so cookies and storage never leak between workers.

use crate::browser::stealth::{random_user_agent, random_viewport, LanguagePrefs, CHROMIUM_ARGS};
use crate::browser::{
    with_timeout, BrowserEngine, BrowserError, BrowserLauncher, BrowserResult, BrowserSession,
};
use crate::config::BrowserConfig;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// Interval between DOM polls while waiting for a selector
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

type SharedBrowser = Arc<RwLock<Option<Browser>>>;

fn protocol_error(err: impl std::fmt::Display) -> BrowserError {
    BrowserError::Protocol(err.to_string())
}

/// Launches a headless Chromium process
pub struct ChromiumLauncher {
    config: BrowserConfig,
    languages: LanguagePrefs,
}

impl ChromiumLauncher {
    pub fn new(config: BrowserConfig, languages: LanguagePrefs) -> Self {
        Self { config, languages }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> BrowserResult<Arc<dyn BrowserEngine>> {
        let engine = ChromiumEngine::launch(&self.config, self.languages.clone()).await?;
        Ok(Arc::new(engine))
    }
}

/// Shared Chromium process for one run
pub struct ChromiumEngine {
    browser: SharedBrowser,
    handler: Mutex<Option<JoinHandle<()>>>,
    timeout: Duration,
    stealth_script: String,
}

impl ChromiumEngine {
    /// Starts Chromium and the task that drives its protocol connection
    pub async fn launch(config: &BrowserConfig, languages: LanguagePrefs) -> BrowserResult<Self> {
        let timeout = Duration::from_secs(config.navigation_timeout_secs);
        let (width, height) = random_viewport();

        let mut builder = CdpConfig::builder()
            .request_timeout(timeout)
            .window_size(width, height)
            .no_sandbox();
        for arg in CHROMIUM_ARGS {
            builder = builder.arg(*arg);
        }
        builder = builder.arg(languages.lang_arg());
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &config.executable {
            builder = builder.chrome_executable(executable);
        }
        let cdp_config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Chromium handler event error: {}", e);
                }
            }
        });

        tracing::info!(headless = config.headless, lang = languages.tag(), "Chromium launched");

        Ok(Self {
            browser: Arc::new(RwLock::new(Some(browser))),
            handler: Mutex::new(Some(handler_task)),
            timeout,
            stealth_script: languages.stealth_script(),
        })
    }

    async fn open_page(&self, context_id: &BrowserContextId) -> BrowserResult<Page> {
        let guard = self.browser.read().await;
        let browser = guard.as_ref().ok_or(BrowserError::Closed)?;

        let mut target = CreateTargetParams::new("about:blank");
        target.browser_context_id = Some(context_id.clone());
        let page = browser.new_page(target).await.map_err(protocol_error)?;
        drop(guard);

        let (width, height) = random_viewport();
        page.execute(SetUserAgentOverrideParams::new(random_user_agent()))
            .await
            .map_err(protocol_error)?;
        page.execute(SetDeviceMetricsOverrideParams::new(
            width as i64,
            height as i64,
            1.0,
            false,
        ))
        .await
        .map_err(protocol_error)?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(self.stealth_script.clone()))
            .await
            .map_err(protocol_error)?;

        Ok(page)
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn new_session(&self) -> BrowserResult<Box<dyn BrowserSession>> {
        let context_id = {
            let guard = self.browser.read().await;
            let browser = guard.as_ref().ok_or(BrowserError::Closed)?;
            browser
                .execute(CreateBrowserContextParams::default())
                .await
                .map_err(protocol_error)?
                .result
                .browser_context_id
                .clone()
        };

        match self.open_page(&context_id).await {
            Ok(page) => Ok(Box::new(ChromiumSession {
                page,
                context_id,
                browser: self.browser.clone(),
                timeout: self.timeout,
                closed: AtomicBool::new(false),
            })),
            Err(e) => {
                dispose_context(&self.browser, &context_id).await;
                Err(e)
            }
        }
    }

    async fn shutdown(&self) -> BrowserResult<()> {
        let browser = self.browser.write().await.take();
        let result = match browser {
            Some(mut browser) => {
                let closed = browser.close().await.map(|_| ()).map_err(protocol_error);
                if let Err(e) = browser.wait().await {
                    tracing::warn!("Waiting for Chromium to exit failed: {}", e);
                }
                closed
            }
            None => Ok(()),
        };

        if let Some(handler) = self.handler.lock().await.take() {
            handler.abort();
        }

        tracing::info!("Chromium shut down");
        result
    }
}

async fn dispose_context(browser: &SharedBrowser, context_id: &BrowserContextId) {
    let guard = browser.read().await;
    if let Some(browser) = guard.as_ref() {
        if let Err(e) = browser
            .execute(DisposeBrowserContextParams::new(context_id.clone()))
            .await
        {
            tracing::warn!("Failed to dispose browser context: {}", e);
        }
    }
}

/// One page inside its own browser context
struct ChromiumSession {
    page: Page,
    context_id: BrowserContextId,
    browser: SharedBrowser,
    timeout: Duration,
    closed: AtomicBool,
}

impl ChromiumSession {
    fn ensure_open(&self) -> BrowserResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrowserError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&self, url: &str) -> BrowserResult<()> {
        self.ensure_open()?;
        with_timeout("goto", self.timeout, async {
            self.page
                .goto(url)
                .await
                .map_err(|e| BrowserError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            Ok(())
        })
        .await
    }

    async fn reload(&self) -> BrowserResult<()> {
        self.ensure_open()?;
        with_timeout("reload", self.timeout, async {
            self.page.reload().await.map_err(protocol_error)?;
            Ok(())
        })
        .await
    }

    async fn content(&self) -> BrowserResult<String> {
        self.ensure_open()?;
        with_timeout("content", self.timeout, async {
            self.page.content().await.map_err(protocol_error)
        })
        .await
    }

    async fn current_url(&self) -> BrowserResult<Option<String>> {
        self.ensure_open()?;
        self.page.url().await.map_err(protocol_error)
    }

    async fn click(&self, selector: &str) -> BrowserResult<()> {
        self.ensure_open()?;
        with_timeout("click", self.timeout, async {
            let element = self
                .page
                .find_element(selector)
                .await
                .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;
            element.click().await.map_err(protocol_error)?;
            Ok(())
        })
        .await
    }

    async fn wait_for_selector(&self, selector: &str) -> BrowserResult<()> {
        self.ensure_open()?;
        let wait = async {
            loop {
                if self.page.find_element(selector).await.is_ok() {
                    return Ok(());
                }
                tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
            }
        };

        match tokio::time::timeout(self.timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(BrowserError::SelectorNotFound(selector.to_string())),
        }
    }

    async fn close(&self) -> BrowserResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let closed = self.page.clone().close().await.map_err(protocol_error);
        dispose_context(&self.browser, &self.context_id).await;
        closed
    }
}
