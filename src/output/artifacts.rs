//! Per-run artifact directory
//!
//! Layout: `<root>/<retailer>-<YYYYmmddTHHMMSS>-<run>/` holding `links.json`,
//! `products.jsonl`, `summary.json` and `summary.md`, where `<run>` is the
//! first eight hex digits of the run id. Artifacts are write-once and never
//! read back by the crawler; an existing run directory is never reused.

use crate::output::markdown::write_markdown_report;
use crate::output::summary::RunSummary;
use crate::output::OutputResult;
use crate::product::StandardProductRecord;
use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

pub struct RunArtifacts {
    dir: PathBuf,
    products: Mutex<()>,
}

impl RunArtifacts {
    /// Creates the run directory under `root`
    ///
    /// Fails with `AlreadyExists` rather than writing into another run's directory.
    pub fn create(
        root: &Path,
        retailer: &str,
        started_at: DateTime<Utc>,
        run_id: Uuid,
    ) -> OutputResult<Self> {
        let run = run_id.simple().to_string();
        let name = format!(
            "{}-{}-{}",
            retailer,
            started_at.format("%Y%m%dT%H%M%S"),
            &run[..8]
        );
        fs::create_dir_all(root)?;
        let dir = root.join(name);
        fs::create_dir(&dir)?;

        Ok(Self {
            dir,
            products: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes the collected product links
    pub fn write_links(&self, links: &[String]) -> OutputResult<()> {
        let json = serde_json::to_string_pretty(links)?;
        fs::write(self.dir.join("links.json"), json)?;
        Ok(())
    }

    /// Appends one stored record as a JSON line
    pub fn append_product(&self, record: &StandardProductRecord) -> OutputResult<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        // One writer at a time keeps lines whole
        let _guard = self.products.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join("products.jsonl"))?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Writes `summary.json` and `summary.md`
    pub fn write_summary(&self, summary: &RunSummary) -> OutputResult<()> {
        let json = serde_json::to_string_pretty(summary)?;
        fs::write(self.dir.join("summary.json"), json)?;
        write_markdown_report(summary, &self.dir.join("summary.md"))
    }
}
