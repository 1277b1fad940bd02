//! Console reporting of run statistics

use crate::adapter::CategoryDescriptor;
use crate::output::summary::RunSummary;

/// Prints a run summary to stdout in a formatted manner
pub fn print_summary(summary: &RunSummary) {
    println!("=== Crawl Summary ===\n");

    println!("Run:");
    println!("  Run ID: {}", summary.run_id);
    println!("  Retailer: {}", summary.retailer);
    println!("  Category: {}", summary.category_url);
    println!("  Elapsed: {:.1}s", summary.elapsed_secs);
    println!();

    println!("Links:");
    println!("  Listing pages visited: {}", summary.pages_visited);
    println!("  Unique product links: {}", summary.links_found);
    println!("  Duplicates removed: {}", summary.duplicates_removed);
    println!("  Already cached: {}", summary.already_cached);
    println!();

    println!("Products:");
    println!("  Attempted: {}", summary.attempted);
    println!("  Stored: {}", summary.succeeded);
    println!("  Failed: {}", summary.failed);
    println!("  Rate: {:.2} products/sec", summary.rate_per_sec);
    println!();

    if !summary.failures.is_empty() {
        println!("Failures ({}):", summary.failures.len());
        for failure in summary.failures.iter().take(10) {
            println!("  - {}: {}", failure.url, failure.error);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} products stored)",
        summary.success_rate(),
        summary.succeeded,
        summary.attempted
    );
}

/// Prints a retailer's default categories
pub fn print_categories(retailer: &str, categories: &[CategoryDescriptor]) {
    println!("Categories for {}:", retailer);
    let width = categories.iter().map(|c| c.name.len()).max().unwrap_or(0);
    for category in categories {
        println!("  {:<width$}  {}", category.name, category.url, width = width);
    }
}
