//! Storage module for persisting product records
//!
//! This module handles:
//! - The [`ProductSink`] contract the crawl writes through
//! - Storage errors carrying a code, details and a remedy hint
//! - A SQLite sink keyed by `(retailer, product_id)`

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{SqliteSink, StoredProduct};
pub use traits::{ProductSink, StorageError, StorageResult};

use std::path::Path;

/// Opens the SQLite sink at `path`, creating the database if needed
pub fn open_sink(path: &Path) -> StorageResult<SqliteSink> {
    SqliteSink::open(path)
}
