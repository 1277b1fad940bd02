//! IKEA adapter
//!
//! Listing pages grow in place: "Show more" either links to `?page=N` (which
//! renders every product up to page N) or, with scripts enabled, appends the
//! next batch. Both cases repeat earlier links, which the collector dedups.

use crate::adapter::markup::ProductSelectors;
use crate::adapter::site::SiteLayout;
use crate::adapter::standard::standardize;
use crate::adapter::{AdapterOptions, CategoryDescriptor, PageTurn, RetailerAdapter};
use crate::browser::{BrowserError, BrowserSession};
use crate::product::{RawProductRecord, StandardProductRecord};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

/// Default categories, as `(name, path below the locale root)`
const CATEGORIES: &[(&str, &str)] = &[
    ("Chairs", "cat/chairs-fu002/"),
    ("Sofas & armchairs", "cat/sofas-armchairs-fu003/"),
    ("Tables & desks", "cat/tables-desks-fu004/"),
    ("Beds", "cat/beds-bm003/"),
    ("Bookcases & shelving units", "cat/bookcases-shelving-units-st002/"),
];

const LAYOUT: SiteLayout = SiteLayout {
    listing_ready: ".plp-product-list, .plp-fragment-wrapper, .product-fragment",
    listing_links: &[
        ".plp-fragment-wrapper a.plp-product__image-link",
        ".plp-product-list a[href*=\"/p/\"]",
        "a[href*=\"/p/\"]",
    ],
    is_product_url: is_product_url,
    next_links: &[
        "a.plp-btn--show-more[href]",
        ".catalog-bottom-container a[href*=\"page=\"]",
        "a[rel=\"next\"]",
    ],
    load_more: &[
        "button.plp-btn--show-more",
        ".catalog-bottom-container button",
    ],
    product_ready: "h1",
    product: ProductSelectors {
        name: &[
            ".pip-header-section__title--big",
            ".pip-header-section__title",
            "h1",
        ],
        price: &[".pip-temp-price", ".pip-price", "[data-price]"],
        image: &[".pip-media-grid__media-image img", ".pip-image"],
        description: &[
            ".pip-product-summary__description",
            ".pip-header-section__description-text",
        ],
        specifications: ".pip-product-dimensions__dimensions-container",
        id_hint: &[".pip-product-identifier__value"],
    },
};

fn product_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"/p/[^/?#]*?-(s?\d{8})/?(?:[?#].*)?$").expect("valid product id pattern")
    })
}

/// IKEA product URLs end in an 8-digit article number, `s`-prefixed for combinations
pub(crate) fn product_id_from_url(url: &str) -> Option<String> {
    product_id_pattern()
        .captures(url)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_string())
}

fn is_product_url(url: &str) -> bool {
    product_id_from_url(url).is_some()
}

/// Adapter for ikea.com
pub struct IkeaAdapter {
    base_url: String,
}

impl IkeaAdapter {
    pub fn new(options: &AdapterOptions) -> Self {
        Self {
            base_url: format!(
                "https://www.ikea.com/{}/{}/",
                options.country.to_lowercase(),
                options.language.to_lowercase()
            ),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RetailerAdapter for IkeaAdapter {
    fn retailer_name(&self) -> &str {
        "ikea"
    }

    fn categories(&self) -> Vec<CategoryDescriptor> {
        CATEGORIES
            .iter()
            .map(|(name, path)| CategoryDescriptor::new(*name, format!("{}{}", self.base_url, path)))
            .collect()
    }

    async fn extract_product_links(
        &self,
        session: &dyn BrowserSession,
        url: Option<&str>,
    ) -> Result<Vec<String>, BrowserError> {
        LAYOUT.extract_links(session, url).await
    }

    async fn next_page(&self, session: &dyn BrowserSession) -> Result<PageTurn, BrowserError> {
        LAYOUT.advance(session).await
    }

    async fn extract_product(
        &self,
        session: &dyn BrowserSession,
        url: &str,
    ) -> Result<Option<RawProductRecord>, BrowserError> {
        LAYOUT.capture_product(session, url).await
    }

    fn transform(&self, raw: &RawProductRecord) -> Option<StandardProductRecord> {
        standardize(self.retailer_name(), raw, product_id_from_url)
    }
}
