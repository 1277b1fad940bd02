//! URL handling for product links
//!
//! This module provides:
//! - Product URL normalization, used as the deduplication and cache key
//! - Resolution of relative `href` values found on listing pages

mod normalize;

pub use normalize::normalize_url;

use url::Url;

/// Resolves a link href to an absolute HTTP(S) URL
///
/// Returns None if the link should be excluded:
/// - empty or fragment-only hrefs
/// - javascript:, mailto:, tel:, data: schemes
/// - hrefs that do not resolve against `base_url`
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" => {
            Some(absolute_url.to_string())
        }
        _ => None,
    }
}

/// Normalizes a URL for use as a cache or dedup key, falling back to the
/// trimmed input when it cannot be parsed
pub fn url_key(url: &str) -> String {
    normalize_url(url)
        .map(String::from)
        .unwrap_or_else(|_| url.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://www.example.com/cat/chairs/").unwrap()
    }

    #[test]
    fn test_resolve_relative_link() {
        assert_eq!(
            resolve_link("/p/chair-1/", &base_url()),
            Some("https://www.example.com/p/chair-1/".to_string())
        );
        assert_eq!(
            resolve_link("armchair-2", &base_url()),
            Some("https://www.example.com/cat/chairs/armchair-2".to_string())
        );
    }

    #[test]
    fn test_resolve_absolute_link() {
        assert_eq!(
            resolve_link("https://other.example.com/p/1", &base_url()),
            Some("https://other.example.com/p/1".to_string())
        );
    }

    #[test]
    fn test_skip_special_links() {
        for href in ["", "  ", "#top", "javascript:void(0)", "mailto:a@b.c", "tel:123", "data:text/plain,x"] {
            assert_eq!(resolve_link(href, &base_url()), None, "{} should be skipped", href);
        }
    }

    #[test]
    fn test_url_key() {
        assert_eq!(
            url_key("https://example.com/p/1?utm_source=mail#top"),
            "https://example.com/p/1"
        );
        assert_eq!(url_key("  not a url "), "not a url");
    }
}
