//! Wayfair adapter

use crate::adapter::markup::ProductSelectors;
use crate::adapter::site::SiteLayout;
use crate::adapter::standard::standardize;
use crate::adapter::{AdapterOptions, CategoryDescriptor, PageTurn, RetailerAdapter};
use crate::browser::{BrowserError, BrowserSession};
use crate::product::{RawProductRecord, StandardProductRecord};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

const CATEGORIES: &[(&str, &str)] = &[
    ("Accent chairs", "furniture/sb0/accent-chairs-c531080.html"),
    ("Sofas", "furniture/sb0/sofas-c413892.html"),
    ("Coffee tables", "furniture/sb0/coffee-tables-c414602.html"),
    ("Beds", "furniture/sb0/beds-c46122.html"),
    ("Bookcases", "furniture/sb0/bookcases-c413881.html"),
];

const LAYOUT: SiteLayout = SiteLayout {
    listing_ready: "[data-hb-id=\"Grid\"], [data-test-id=\"Browse-Grid\"], .BrowseProductCard",
    listing_links: &[
        "[data-test-id=\"ListingCard\"] a[href*=\"/pdp/\"]",
        "a.ProductCard[href*=\"/pdp/\"]",
        "a[href*=\"/pdp/\"]",
    ],
    is_product_url: is_product_url,
    next_links: &[
        "a[data-enzyme-id=\"paginationNextPageLink\"]",
        "a[aria-label=\"Next Page\"]",
        "a[rel=\"next\"]",
    ],
    load_more: &[],
    product_ready: "[data-enzyme-id=\"ProductTitle\"], h1",
    product: ProductSelectors {
        name: &[
            "[data-rtl-id=\"listingHeaderNameHeading\"]",
            "[data-enzyme-id=\"ProductTitle\"]",
            "h1",
        ],
        price: &[
            "[data-test-id=\"PriceDisplay\"]",
            ".SFPrice span",
            "[data-enzyme-id=\"PriceBlock\"]",
        ],
        image: &[
            "[data-enzyme-id=\"FluidImage\"] img",
            "[data-hb-id=\"FluidImage\"] img",
        ],
        description: &[
            "[data-hb-id=\"BoxV3\"] .ProductOverviewInformation-description",
            "[data-enzyme-id=\"ProductOverview\"]",
        ],
        specifications: "[data-enzyme-id=\"SpecificationsTable\"], .Specifications",
        id_hint: &["[data-enzyme-id=\"ProductSku\"]"],
    },
};

fn product_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)/pdp/[^?#]*-([a-z]{1,5}\d{3,})\.html").expect("valid product id pattern")
    })
}

/// Wayfair SKUs (`W001234567`, `BL1234`) trail the product slug in `/pdp/` URLs
pub(crate) fn product_id_from_url(url: &str) -> Option<String> {
    product_id_pattern()
        .captures(url)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_uppercase())
}

fn is_product_url(url: &str) -> bool {
    product_id_from_url(url).is_some()
}

fn domain_for(country: &str) -> &'static str {
    match country.to_lowercase().as_str() {
        "gb" | "uk" => "www.wayfair.co.uk",
        "de" => "www.wayfair.de",
        "ca" => "www.wayfair.ca",
        _ => "www.wayfair.com",
    }
}

/// Adapter for the Wayfair storefronts
///
/// Language is implied by the storefront; only the country selects a domain.
pub struct WayfairAdapter {
    base_url: String,
}

impl WayfairAdapter {
    pub fn new(options: &AdapterOptions) -> Self {
        Self {
            base_url: format!("https://{}/", domain_for(&options.country)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RetailerAdapter for WayfairAdapter {
    fn retailer_name(&self) -> &str {
        "wayfair"
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
