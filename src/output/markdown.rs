//! Markdown run report
//!
//! A human-readable companion to `summary.json` in each run directory.

use crate::output::summary::RunSummary;
use crate::output::OutputResult;
use std::fs;
use std::path::Path;

/// Failures listed individually before the report truncates
const MAX_LISTED_FAILURES: usize = 25;

/// Writes the markdown report for `summary` to `output_path`
pub fn write_markdown_report(summary: &RunSummary, output_path: &Path) -> OutputResult<()> {
    fs::write(output_path, format_markdown_report(summary))?;
    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_report(summary: &RunSummary) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Crawl report: {}\n\n", summary.retailer));

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Run ID**: {}\n", summary.run_id));
    md.push_str(&format!("- **Category**: {}\n", summary.category_url));
    md.push_str(&format!("- **Started**: {}\n", summary.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", summary.finished_at.to_rfc3339()));
    md.push_str(&format!(
        "- **Duration**: {:.1} seconds ({:.2} minutes)\n",
        summary.elapsed_secs,
        summary.elapsed_secs / 60.0
    ));
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.config_hash));

    md.push_str("## Link Collection\n\n");
    md.push_str(&format!("- **Listing pages visited**: {}\n", summary.pages_visited));
    md.push_str(&format!("- **Unique product links**: {}\n", summary.links_found));
    md.push_str(&format!(
        "- **Duplicates removed**: {}\n",
        summary.duplicates_removed
    ));
    md.push_str(&format!(
        "- **Skipped (already cached)**: {}\n\n",
        summary.already_cached
    ));

    md.push_str("## Products\n\n");
    md.push_str("| Attempted | Stored | Failed | Success Rate | Rate |\n");
    md.push_str("|-----------|--------|--------|--------------|------|\n");
    md.push_str(&format!(
        "| {} | {} | {} | {:.1}% | {:.2}/s |\n\n",
        summary.attempted,
        summary.succeeded,
        summary.failed,
        summary.success_rate(),
        summary.rate_per_sec
    ));

    if !summary.failures.is_empty() {
        md.push_str("## Failures\n\n");
        for failure in summary.failures.iter().take(MAX_LISTED_FAILURES) {
            md.push_str(&format!("- `{}`: {}\n", failure.url, failure.error));
        }
        if summary.failures.len() > MAX_LISTED_FAILURES {
            md.push_str(&format!(
                "- ... and {} more\n",
                summary.failures.len() - MAX_LISTED_FAILURES
            ));
        }
        md.push('\n');
    }

    md
}
