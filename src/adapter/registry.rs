//! Retailer identifier to adapter mapping

use crate::adapter::{AdapterOptions, IkeaAdapter, RetailerAdapter, WayfairAdapter};
use crate::ConfigError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Retailers with a built-in adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Retailer {
    Ikea,
    Wayfair,
}

impl Retailer {
    pub const ALL: [Retailer; 2] = [Retailer::Ikea, Retailer::Wayfair];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ikea => "ikea",
            Self::Wayfair => "wayfair",
        }
    }

    /// Constructs the adapter; performs no I/O
    pub fn adapter(&self, options: &AdapterOptions) -> Arc<dyn RetailerAdapter> {
        match self {
            Self::Ikea => Arc::new(IkeaAdapter::new(options)),
            Self::Wayfair => Arc::new(WayfairAdapter::new(options)),
        }
    }
}

impl fmt::Display for Retailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Retailer {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|retailer| retailer.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ConfigError::UnsupportedRetailer {
                name: wanted.to_string(),
                supported: supported_retailers().join(", "),
            })
    }
}

/// Identifiers accepted by [`resolve_adapter`]
pub fn supported_retailers() -> Vec<&'static str> {
    Retailer::ALL.iter().map(Retailer::as_str).collect()
}

/// Resolves a retailer identifier (case-insensitive) to a constructed adapter
pub fn resolve_adapter(
    retailer: &str,
    options: &AdapterOptions,
) -> Result<Arc<dyn RetailerAdapter>, ConfigError> {
    let retailer: Retailer = retailer.parse()?;
    Ok(retailer.adapter(options))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_case_insensitive() {
        let options = AdapterOptions::default();
        assert_eq!(resolve_adapter("IKEA", &options).unwrap().retailer_name(), "ikea");
        assert_eq!(
            resolve_adapter(" Wayfair ", &options).unwrap().retailer_name(),
            "wayfair"
        );
    }

    #[test]
    fn test_unknown_retailer_lists_supported() {
        let err = match resolve_adapter("acme-furniture", &AdapterOptions::default()) {
            Err(err) => err,
            Ok(_) => panic!("expected unsupported retailer"),
        };

        match &err {
            ConfigError::UnsupportedRetailer { name, supported } => {
                assert_eq!(name, "acme-furniture");
                assert_eq!(supported, "ikea, wayfair");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.to_string().contains("ikea, wayfair"));
    }

    #[test]
    fn test_every_adapter_has_categories() {
        for retailer in Retailer::ALL {
            let adapter = retailer.adapter(&AdapterOptions::default());
            assert!(!adapter.categories().is_empty(), "{} has no categories", retailer);
            assert_eq!(adapter.retailer_name(), retailer.as_str());
        }
    }
}
