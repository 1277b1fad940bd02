//! Raw-to-standard record mapping shared by all adapters

use crate::adapter::markup::{slugify, structured_image, structured_price, structured_specifications};
use crate::product::{Price, RawProductRecord, StandardProductRecord};
use serde_json::Value;

/// Linked-data properties that carry a product identifier, in preference order
const ID_KEYS: &[&str] = &["sku", "productID", "mpn", "gtin13", "gtin"];

/// Manual field holding an identifier scraped from the markup
pub(crate) const ID_HINT_FIELD: &str = "product_id_hint";

fn identifier(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

/// Resolves a product identifier: linked data first, then the scraped hint,
/// then whatever the adapter recovers from the product URL
pub(crate) fn resolve_product_id(
    raw: &RawProductRecord,
    id_from_url: fn(&str) -> Option<String>,
) -> Option<String> {
    let structured = raw.structured.as_ref().and_then(|product| {
        ID_KEYS
            .iter()
            .find_map(|key| product.get(*key).and_then(identifier))
    });

    structured
        .or_else(|| raw.field(ID_HINT_FIELD).map(str::to_string))
        .or_else(|| id_from_url(&raw.url))
}

/// Builds the standard record, or `None` when name or identifier is missing
pub(crate) fn standardize(
    retailer: &str,
    raw: &RawProductRecord,
    id_from_url: fn(&str) -> Option<String>,
) -> Option<StandardProductRecord> {
    let name = raw
        .structured_str("name")
        .or_else(|| raw.field("name"))?
        .to_string();
    let product_id = resolve_product_id(raw, id_from_url)?;

    let structured = raw.structured.as_ref();
    let price = structured
        .and_then(structured_price)
        .or_else(|| raw.field("price_text").map(|text| Price::Text(text.to_string())))
        .unwrap_or(Price::Unavailable);
    let description = raw
        .structured_str("description")
        .or_else(|| raw.field("description"))
        .map(str::to_string);
    let image_url = structured
        .and_then(structured_image)
        .or_else(|| raw.field("image_url").map(str::to_string));
    let specifications = structured
        .and_then(structured_specifications)
        .or_else(|| raw.fields.get("specifications").cloned());

    Some(StandardProductRecord {
        retailer: retailer.to_string(),
        slug: slugify(&name),
        product_id,
        name,
        price,
        raw_data: raw.to_raw_data(),
        url: raw.url.clone(),
        description,
        image_url,
        specifications,
    })
}
