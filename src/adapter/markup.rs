//! HTML helpers shared by the retailer adapters
//!
//! All functions here are synchronous and work on a parsed [`Html`] document
//! or a raw HTML string; `scraper` documents never cross an await point.

use crate::adapter::standard::ID_HINT_FIELD;
use crate::product::{ExtractionMethod, Price, RawProductRecord};
use crate::url::resolve_link;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use url::Url;

/// Parses a selector that is known at compile time to be valid
pub(crate) fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(_) => {
            tracing::warn!("Invalid selector '{}'", css);
            None
        }
    }
}

/// Collapses runs of whitespace and trims
pub(crate) fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

/// Text of the first element matching any of `selectors`
pub(crate) fn select_text(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        let parsed = selector(css)?;
        document
            .select(&parsed)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

/// Attribute of the first element matching any of `selectors`
pub(crate) fn select_attr(document: &Html, selectors: &[&str], attr: &str) -> Option<String> {
    selectors.iter().find_map(|css| {
        let parsed = selector(css)?;
        document
            .select(&parsed)
            .filter_map(|element| element.value().attr(attr))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_string)
    })
}

/// True when any element matches `css`
pub(crate) fn has_element(document: &Html, css: &str) -> bool {
    selector(css)
        .map(|parsed| document.select(&parsed).next().is_some())
        .unwrap_or(false)
}

/// Absolute `href`s of all elements matching `css`, in document order
pub(crate) fn collect_links(document: &Html, css: &str, base_url: &Url) -> Vec<String> {
    let Some(parsed) = selector(css) else {
        return Vec::new();
    };

    document
        .select(&parsed)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, base_url))
        .collect()
}

/// Key/value pairs from definition lists or two-column rows under `container`
pub(crate) fn collect_specifications(document: &Html, container: &str) -> Option<Value> {
    let container_selector = selector(container)?;
    let term = selector("dt, th, .spec-name")?;
    let definition = selector("dd, td, .spec-value")?;

    let mut specs = Map::new();
    for block in document.select(&container_selector) {
        let names = block.select(&term).map(element_text);
        let values = block.select(&definition).map(element_text);
        for (name, value) in names.zip(values) {
            if !name.is_empty() && !value.is_empty() {
                specs.insert(name.trim_end_matches(':').to_string(), Value::String(value));
            }
        }
        if specs.is_empty() {
            let text = element_text(block);
            if !text.is_empty() {
                specs.insert("summary".to_string(), Value::String(text));
            }
        }
    }

    (!specs.is_empty()).then_some(Value::Object(specs))
}

fn is_product_type(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(kind)) => kind == "Product",
        Some(Value::Array(kinds)) => kinds.iter().any(|k| k.as_str() == Some("Product")),
        _ => false,
    }
}

fn find_product(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_product),
        Value::Object(map) => {
            if is_product_type(value) {
                return Some(value);
            }
            map.get("@graph").and_then(find_product)
        }
        _ => None,
    }
}

/// Finds the schema.org `Product` object among the page's JSON-LD blocks
///
/// Handles single objects, top-level arrays and `@graph` containers. Blocks
/// that fail to parse are skipped.
pub fn find_product_json_ld(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let scripts = selector(r#"script[type="application/ld+json"]"#)?;

    document.select(&scripts).find_map(|script| {
        let text = script.text().collect::<String>();
        let parsed: Value = serde_json::from_str(text.trim()).ok()?;
        find_product(&parsed).cloned()
    })
}

fn number_or_string(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(',', "").trim().parse().ok(),
        _ => None,
    }
}

/// Price from a linked-data `offers` entry (object, array or aggregate offer)
pub(crate) fn structured_price(product: &Value) -> Option<Price> {
    let offers = product.get("offers")?;
    let offer = match offers {
        Value::Array(items) => items.first()?,
        other => other,
    };

    let amount = offer
        .get("price")
        .or_else(|| offer.get("lowPrice"))
        .and_then(number_or_string)?;
    let currency = offer
        .get("priceCurrency")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some(Price::Structured { amount, currency })
}

/// First image URL from a linked-data `image` property
pub(crate) fn structured_image(product: &Value) -> Option<String> {
    match product.get("image")? {
        Value::String(url) => Some(url.clone()),
        Value::Array(items) => items.iter().find_map(|item| match item {
            Value::String(url) => Some(url.clone()),
            other => other.get("url").and_then(Value::as_str).map(str::to_string),
        }),
        other => other.get("url").and_then(Value::as_str).map(str::to_string),
    }
}

/// `additionalProperty` name/value pairs as a JSON object
pub(crate) fn structured_specifications(product: &Value) -> Option<Value> {
    let properties = product.get("additionalProperty")?.as_array()?;
    let specs: Map<String, Value> = properties
        .iter()
        .filter_map(|property| {
            let name = property.get("name")?.as_str()?;
            let value = property.get("value")?;
            Some((name.to_string(), value.clone()))
        })
        .collect();

    (!specs.is_empty()).then_some(Value::Object(specs))
}

/// Lowercase, hyphen-separated form of a product name
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Where a retailer's product page keeps each manually scraped field
pub(crate) struct ProductSelectors {
    pub name: &'static [&'static str],
    pub price: &'static [&'static str],
    pub image: &'static [&'static str],
    pub description: &'static [&'static str],
    pub specifications: &'static str,
    pub id_hint: &'static [&'static str],
}

/// Captures a product page: linked data when present, plus every manual field
pub(crate) fn scrape_product_page(
    html: &str,
    url: &str,
    selectors: &ProductSelectors,
) -> RawProductRecord {
    let structured = find_product_json_ld(html);
    let method = if structured.is_some() {
        ExtractionMethod::Structured
    } else {
        ExtractionMethod::Manual
    };

    let document = Html::parse_document(html);
    let mut raw = RawProductRecord::new(url, method);
    raw.structured = structured;

    raw.set_field("name", select_text(&document, selectors.name));
    raw.set_field("price_text", select_text(&document, selectors.price));
    raw.set_field(
        "image_url",
        select_attr(&document, selectors.image, "src")
            .or_else(|| select_attr(&document, &[r#"meta[property="og:image"]"#], "content")),
    );
    raw.set_field(
        "description",
        select_text(&document, selectors.description)
            .or_else(|| select_attr(&document, &[r#"meta[name="description"]"#], "content")),
    );
    raw.set_field(ID_HINT_FIELD, select_text(&document, selectors.id_hint));
    if let Some(specs) = collect_specifications(&document, selectors.specifications) {
        raw.fields.insert("specifications".to_string(), specs);
    }

    raw
}

/// Product links on a listing page, from the first selector that yields any,
/// restricted to URLs accepted by `is_product_url`
pub(crate) fn listing_links(
    html: &str,
    base_url: &Url,
    selectors: &[&str],
    is_product_url: fn(&str) -> bool,
) -> Vec<String> {
    let document = Html::parse_document(html);
    selectors
        .iter()
        .map(|css| {
            collect_links(&document, css, base_url)
                .into_iter()
                .filter(|link| is_product_url(link))
                .collect::<Vec<_>>()
        })
        .find(|links| !links.is_empty())
        .unwrap_or_default()
}

/// How a listing page offers its next page
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NextControl {
    /// A link to navigate to
    Link(String),
    /// A script-driven control to click
    Button(&'static str),
    /// No pagination control present
    None,
}

/// Finds the pagination control on a listing page
pub(crate) fn next_control(
    html: &str,
    base_url: &Url,
    link_selectors: &[&str],
    button_selectors: &'static [&'static str],
) -> NextControl {
    let document = Html::parse_document(html);

    if let Some(target) = select_attr(&document, link_selectors, "href")
        .and_then(|href| resolve_link(&href, base_url))
    {
        return NextControl::Link(target);
    }

    button_selectors
        .iter()
        .copied()
        .find(|css| has_element(&document, css))
        .map(NextControl::Button)
        .unwrap_or(NextControl::None)
}
