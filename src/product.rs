//! Product records flowing through the crawl
//!
//! A [`RawProductRecord`] is whatever an adapter managed to capture from one
//! product page. Adapters turn it into a [`StandardProductRecord`], the
//! storage-ready representation keyed by `(retailer, product_id)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How the fields of a raw record were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// A schema.org `Product` linked-data blob was present on the page
    Structured,
    /// Fields were scraped from the page markup
    Manual,
}

/// Adapter-specific capture from a single product page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProductRecord {
    pub url: String,

    /// The linked-data `Product` object, when the page carried one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<Value>,

    /// Manually scraped fields (`name`, `price_text`, `image_url`, ...)
    pub fields: Map<String, Value>,

    pub extraction_method: ExtractionMethod,

    pub captured_at: DateTime<Utc>,
}

impl RawProductRecord {
    /// Creates an empty record for `url`
    pub fn new(url: impl Into<String>, extraction_method: ExtractionMethod) -> Self {
        Self {
            url: url.into(),
            structured: None,
            fields: Map::new(),
            extraction_method,
            captured_at: Utc::now(),
        }
    }

    /// Stores a manually scraped text field, skipping blank values
    pub fn set_field(&mut self, key: &str, value: Option<String>) {
        if let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            self.fields.insert(key.to_string(), Value::String(value));
        }
    }

    /// Returns a manually scraped text field
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Returns a string property of the linked-data blob
    pub fn structured_str(&self, key: &str) -> Option<&str> {
        self.structured
            .as_ref()
            .and_then(|s| s.get(key))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// True when nothing at all was captured
    pub fn is_empty(&self) -> bool {
        self.structured.is_none() && self.fields.is_empty()
    }

    /// Lossless JSON form stored as `raw_data`
    pub fn to_raw_data(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Product price, either as displayed text or as a parsed amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Structured { amount: f64, currency: String },
    Text(String),
    /// No price could be captured; serializes as `null`
    Unavailable,
}

impl Price {
    /// Human-readable form used for logging and storage
    pub fn display(&self) -> String {
        match self {
            Self::Structured { amount, currency } => format!("{:.2} {}", amount, currency),
            Self::Text(text) => text.clone(),
            Self::Unavailable => "unavailable".to_string(),
        }
    }
}

/// Canonical storage-ready product representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardProductRecord {
    pub retailer: String,
    pub product_id: String,
    pub name: String,
    pub slug: String,
    pub price: Price,
    pub raw_data: Value,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specifications: Option<Value>,
}
