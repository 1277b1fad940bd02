use crate::config::types::{Config, CrawlerConfig, LocaleConfig, OutputConfig};
use crate::ConfigError;
use url::Url;

/// Largest worker budget accepted for the product pipeline
const MAX_CONCURRENCY: usize = 64;

/// Validates the entire configuration
///
/// The retailer identifier is only checked for presence here; whether it names a
/// supported retailer is decided by the adapter registry at run time.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_locale_config(&config.locale)?;
    validate_output_config(&config.output)?;

    if config.browser.navigation_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "navigation-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawl behavior configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.retailer.trim().is_empty() {
        return Err(ConfigError::Validation(
            "retailer cannot be empty".to_string(),
        ));
    }

    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-requests must be between 1 and {}, got {}",
            MAX_CONCURRENCY, config.max_concurrent_requests
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1 when set".to_string(),
        ));
    }

    if config.checkpoint_interval < 1 {
        return Err(ConfigError::Validation(
            "checkpoint-interval must be >= 1".to_string(),
        ));
    }

    if let Some(category_url) = &config.category_url {
        let url = Url::parse(category_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid category-url '{}': {}", category_url, e))
        })?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::InvalidUrl(format!(
                "category-url '{}' must use http or https",
                category_url
            )));
        }
    }

    Ok(())
}

/// Validates country and language codes
fn validate_locale_config(config: &LocaleConfig) -> Result<(), ConfigError> {
    validate_locale_code("country", &config.country)?;
    validate_locale_code("language", &config.language)
}

fn validate_locale_code(field: &str, code: &str) -> Result<(), ConfigError> {
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ConfigError::Validation(format!(
            "{} must be a two-letter code, got '{}'",
            field, code
        )));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.cache_location.is_empty() {
        return Err(ConfigError::Validation(
            "cache-location cannot be empty".to_string(),
        ));
    }

    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.artifacts_dir.is_empty() {
        return Err(ConfigError::Validation(
            "artifacts-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}
