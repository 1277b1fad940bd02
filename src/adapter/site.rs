//! Browser-driven extraction flow shared by selector-based adapters
//!
//! Retailers differ in markup, not in the shape of the crawl: wait for the
//! listing, read product links, follow or click the pagination control, load a
//! product page and scrape it. [`SiteLayout`] captures the differences.

use crate::adapter::markup::{
    listing_links, next_control, scrape_product_page, NextControl, ProductSelectors,
};
use crate::adapter::PageTurn;
use crate::browser::{BrowserError, BrowserSession};
use crate::product::RawProductRecord;
use std::time::Duration;
use url::Url;

/// Time given to a load-more control to render additional products
const LOAD_MORE_SETTLE: Duration = Duration::from_millis(1500);

/// Selector tables describing one retailer's markup
pub(crate) struct SiteLayout {
    /// Present once a listing page has rendered its product grid
    pub listing_ready: &'static str,
    /// Candidate selectors for product links, in preference order
    pub listing_links: &'static [&'static str],
    pub is_product_url: fn(&str) -> bool,
    /// Pagination links to navigate to
    pub next_links: &'static [&'static str],
    /// Script-driven "load more" controls to click
    pub load_more: &'static [&'static str],
    /// Present once a product page has rendered
    pub product_ready: &'static str,
    pub product: ProductSelectors,
}

async fn page_base(
    session: &dyn BrowserSession,
    fallback: Option<&str>,
) -> Result<Url, BrowserError> {
    let current = session.current_url().await?;
    let raw = current
        .as_deref()
        .or(fallback)
        .ok_or_else(|| BrowserError::Unsupported("session has no current page".to_string()))?;

    Url::parse(raw).map_err(|e| BrowserError::Navigation {
        url: raw.to_string(),
        message: e.to_string(),
    })
}

/// Waits for `selector`; `Ok(false)` when it never appeared
async fn wait_for(session: &dyn BrowserSession, selector: &str) -> Result<bool, BrowserError> {
    match session.wait_for_selector(selector).await {
        Ok(()) => Ok(true),
        Err(BrowserError::SelectorNotFound(_)) | Err(BrowserError::Timeout { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

impl SiteLayout {
    pub(crate) async fn extract_links(
        &self,
        session: &dyn BrowserSession,
        url: Option<&str>,
    ) -> Result<Vec<String>, BrowserError> {
        if let Some(url) = url {
            session.goto(url).await?;
        }

        if !wait_for(session, self.listing_ready).await? {
            tracing::debug!("No product listing rendered on {:?}", url);
            return Ok(Vec::new());
        }

        let base = page_base(session, url).await?;
        let html = session.content().await?;
        Ok(listing_links(
            &html,
            &base,
            self.listing_links,
            self.is_product_url,
        ))
    }

    pub(crate) async fn advance(
        &self,
        session: &dyn BrowserSession,
    ) -> Result<PageTurn, BrowserError> {
        let base = page_base(session, None).await?;
        let html = session.content().await?;

        match next_control(&html, &base, self.next_links, self.load_more) {
            NextControl::Link(target) if target != base.as_str() => {
                tracing::debug!("Following pagination link {}", target);
                session.goto(&target).await?;
                Ok(PageTurn::Advanced)
            }
            NextControl::Link(_) | NextControl::None => Ok(PageTurn::Exhausted),
            NextControl::Button(control) => {
                let before =
                    listing_links(&html, &base, self.listing_links, self.is_product_url).len();
                session.click(control).await?;
                tokio::time::sleep(LOAD_MORE_SETTLE).await;

                let after_html = session.content().await?;
                let after =
                    listing_links(&after_html, &base, self.listing_links, self.is_product_url)
                        .len();
                tracing::debug!(before, after, "Clicked load-more control '{}'", control);

                if after > before {
                    Ok(PageTurn::Advanced)
                } else {
                    Ok(PageTurn::Exhausted)
                }
            }
        }
    }

    pub(crate) async fn capture_product(
        &self,
        session: &dyn BrowserSession,
        url: &str,
    ) -> Result<Option<RawProductRecord>, BrowserError> {
        session.goto(url).await?;

        if !wait_for(session, self.product_ready).await? {
            tracing::debug!("Product page {} never showed '{}'", url, self.product_ready);
        }

        let html = session.content().await?;
        let raw = scrape_product_page(&html, url, &self.product);

        if raw.is_empty() {
            tracing::warn!("Nothing extractable on product page {}", url);
            return Ok(None);
        }

        Ok(Some(raw))
    }
}
