//! Retailer adapters
//!
//! An adapter isolates everything that is specific to one retailer's site:
//! where its categories live, how product links appear on a listing page, how
//! pagination advances, and how a product page maps onto a
//! [`StandardProductRecord`]. The crawl engine only ever talks to
//! [`RetailerAdapter`].

mod ikea;
mod markup;
mod registry;
mod site;
mod standard;
mod wayfair;

pub use ikea::IkeaAdapter;
pub use markup::{find_product_json_ld, slugify};
pub use registry::{resolve_adapter, supported_retailers, Retailer};
pub use wayfair::WayfairAdapter;

use crate::browser::{BrowserError, BrowserSession};
use crate::product::{RawProductRecord, StandardProductRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A named entry point into a retailer's catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDescriptor {
    pub name: String,
    pub url: String,
}

impl CategoryDescriptor {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Outcome of trying to advance a listing to its next page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTurn {
    /// The session now shows the next page (or more products were loaded)
    Advanced,
    /// The listing has no further pages
    Exhausted,
}

/// Options passed to adapter construction
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    /// Two-letter country code used in base URLs
    pub country: String,
    /// Two-letter language code used in base URLs
    pub language: String,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            country: "us".to_string(),
            language: "en".to_string(),
        }
    }
}

/// Extraction contract implemented once per retailer
///
/// Navigation failures surface as `Err` so the caller can retry them. Expected
/// absences (an empty listing, a page without linked data) are not errors.
#[async_trait]
pub trait RetailerAdapter: Send + Sync {
    /// Stable identifier stored on every record
    fn retailer_name(&self) -> &str;

    /// Default catalog entry points; never empty
    fn categories(&self) -> Vec<CategoryDescriptor>;

    /// Returns the absolute product URLs visible on a listing page
    ///
    /// Navigates to `url` first when given, otherwise reads the page the session
    /// is already on. An empty vector means "no products found".
    async fn extract_product_links(
        &self,
        session: &dyn BrowserSession,
        url: Option<&str>,
    ) -> Result<Vec<String>, BrowserError>;

    /// Advances the session to the next page of the current listing
    async fn next_page(&self, session: &dyn BrowserSession) -> Result<PageTurn, BrowserError>;

    /// Navigates to a product page and captures everything extractable
    ///
    /// Falls back to scraping the markup when no linked data is present;
    /// returns `Ok(None)` when nothing usable was captured.
    async fn extract_product(
        &self,
        session: &dyn BrowserSession,
        url: &str,
    ) -> Result<Option<RawProductRecord>, BrowserError>;

    /// Maps a raw capture onto the canonical record; pure
    ///
    /// Returns `None` when no name or no product identifier can be resolved.
    fn transform(&self, raw: &RawProductRecord) -> Option<StandardProductRecord>;
}
