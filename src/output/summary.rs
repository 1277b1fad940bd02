//! Run summary record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A product URL that did not produce a stored record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUrl {
    pub url: String,
    pub error: String,
}

/// Counts and timings for one finished run
///
/// Derived accounting only; the product store and the crawl cache remain the
/// sources of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub retailer: String,
    pub category_url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Unique product links collected from the listing
    pub links_found: usize,
    pub duplicates_removed: usize,
    pub pages_visited: u32,

    /// Links skipped because the crawl cache already held them
    pub already_cached: usize,

    /// Links handed to the product pipeline
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,

    pub elapsed_secs: f64,
    pub rate_per_sec: f64,
    pub config_hash: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailedUrl>,
}

impl RunSummary {
    /// Percentage of attempted products that were stored
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            (self.succeeded as f64 / self.attempted as f64) * 100.0
        }
    }

    /// Run duration as reported by wall-clock timestamps
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

#[cfg(test)]
pub(crate) fn sample_summary() -> RunSummary {
    let started_at = Utc::now();
    RunSummary {
        run_id: Uuid::new_v4(),
        retailer: "ikea".to_string(),
        category_url: "https://www.ikea.com/us/en/cat/chairs-fu002/".to_string(),
        started_at,
        finished_at: started_at + chrono::Duration::seconds(90),
        links_found: 12,
        duplicates_removed: 3,
        pages_visited: 2,
        already_cached: 2,
        attempted: 10,
        succeeded: 8,
        failed: 2,
        elapsed_secs: 90.0,
        rate_per_sec: 10.0 / 90.0,
        config_hash: "abc123".to_string(),
        failures: vec![FailedUrl {
            url: "https://www.ikea.com/us/en/p/x-00000001/".to_string(),
            error: "Transformation produced no record".to_string(),
        }],
    }
}
