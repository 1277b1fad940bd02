//! SQLite product sink
//!
//! Products are upserted on `(retailer, product_id)`, so reprocessing a URL
//! after an interrupted run replaces the row instead of duplicating it.

use crate::output::RunSummary;
use crate::product::{Price, StandardProductRecord};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ProductSink, StorageError, StorageResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// A stored product row
#[derive(Debug, Clone, PartialEq)]
pub struct StoredProduct {
    pub retailer: String,
    pub product_id: String,
    pub name: String,
    pub slug: String,
    pub price_display: String,
    pub url: String,
    pub raw_data: serde_json::Value,
    pub first_seen_at: String,
    pub updated_at: String,
}

/// SQLite-backed [`ProductSink`]
pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteSink)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database or apply the schema
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> StorageResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("connection mutex poisoned".to_string()))
    }

    /// Inserts or replaces a product row
    pub fn upsert(&self, record: &StandardProductRecord) -> StorageResult<()> {
        let price = match &record.price {
            Price::Unavailable => None,
            other => Some(serde_json::to_string(other)?),
        };
        let specifications = record
            .specifications
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let raw_data = serde_json::to_string(&record.raw_data)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO products (retailer, product_id, name, slug, price, price_display, url,
                                   description, image_url, specifications, raw_data,
                                   first_seen_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
             ON CONFLICT(retailer, product_id) DO UPDATE SET
                name = excluded.name,
                slug = excluded.slug,
                price = excluded.price,
                price_display = excluded.price_display,
                url = excluded.url,
                description = excluded.description,
                image_url = excluded.image_url,
                specifications = excluded.specifications,
                raw_data = excluded.raw_data,
                updated_at = excluded.updated_at",
            params![
                record.retailer,
                record.product_id,
                record.name,
                record.slug,
                price,
                record.price.display(),
                record.url,
                record.description,
                record.image_url,
                specifications,
                raw_data,
                now,
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                StorageError::ConstraintViolation {
                    retailer: record.retailer.clone(),
                    product_id: record.product_id.clone(),
                    details: message.unwrap_or_else(|| failure.to_string()),
                }
            }
            other => StorageError::Sqlite(other),
        })?;

        Ok(())
    }

    /// Looks up one product by its key
    pub fn get_product(&self, retailer: &str, product_id: &str) -> StorageResult<Option<StoredProduct>> {
        let conn = self.connection()?;
        let row = conn
            .query_row(
                "SELECT retailer, product_id, name, slug, price_display, url, raw_data,
                        first_seen_at, updated_at
                 FROM products WHERE retailer = ?1 AND product_id = ?2",
                params![retailer, product_id],
                |row| {
                    Ok((
                        StoredProduct {
                            retailer: row.get(0)?,
                            product_id: row.get(1)?,
                            name: row.get(2)?,
                            slug: row.get(3)?,
                            price_display: row.get(4)?,
                            url: row.get(5)?,
                            raw_data: serde_json::Value::Null,
                            first_seen_at: row.get(7)?,
                            updated_at: row.get(8)?,
                        },
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((mut product, raw)) => {
                product.raw_data = serde_json::from_str(&raw)?;
                Ok(Some(product))
            }
            None => Ok(None),
        }
    }

    /// Number of stored products, optionally for one retailer
    pub fn count_products(&self, retailer: Option<&str>) -> StorageResult<u64> {
        let conn = self.connection()?;
        let count: i64 = match retailer {
            Some(retailer) => conn.query_row(
                "SELECT COUNT(*) FROM products WHERE retailer = ?1",
                [retailer],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }

    /// Inserts a finished run
    pub fn insert_run(&self, summary: &RunSummary) -> StorageResult<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT OR REPLACE INTO runs (run_id, retailer, category_url, started_at, finished_at,
                                          links_found, attempted, succeeded, failed, config_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                summary.run_id.to_string(),
                summary.retailer,
                summary.category_url,
                summary.started_at.to_rfc3339(),
                summary.finished_at.to_rfc3339(),
                summary.links_found as i64,
                summary.attempted as i64,
                summary.succeeded as i64,
                summary.failed as i64,
                summary.config_hash,
            ],
        )?;
        Ok(())
    }

    /// Number of recorded runs
    pub fn count_runs(&self) -> StorageResult<u64> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[async_trait]
impl ProductSink for SqliteSink {
    async fn store(&self, record: &StandardProductRecord) -> StorageResult<()> {
        self.upsert(record)
    }

    async fn record_run(&self, summary: &RunSummary) -> StorageResult<()> {
        self.insert_run(summary)
    }
}
