//! Statistics over the stored products
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::storage::{BrandCount, FieldCoverage, JobRecord, Storage};
use crate::HarvestError;

/// How many brands and jobs the summary shows
const TOP_BRANDS: usize = 10;
const RECENT_JOBS: u32 = 10;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct ProductStatistics {
    /// Field completeness and price range
    pub coverage: FieldCoverage,

    /// Most common brands
    pub top_brands: Vec<BrandCount>,

    /// Number of distinct brands
    pub distinct_brands: usize,

    /// Latest crawl jobs, newest first
    pub recent_jobs: Vec<JobRecord>,
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> Result<ProductStatistics, HarvestError> {
    let coverage = storage.field_coverage()?;
    let brands = storage.brand_counts()?;
    let recent_jobs = storage.recent_jobs(RECENT_JOBS)?;

    Ok(ProductStatistics {
        coverage,
        distinct_brands: brands.len(),
        top_brands: brands.into_iter().take(TOP_BRANDS).collect(),
        recent_jobs,
    })
}

fn percentage(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &ProductStatistics) {
    let c = &stats.coverage;

    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Total products: {}", c.total);
    println!("  Distinct brands: {}", stats.distinct_brands);
    println!();

    println!("Field Coverage:");
    for (label, count) in [
        ("brand", c.with_brand),
        ("price", c.with_price),
        ("unit price", c.with_unit_price),
        ("size", c.with_size),
        ("promo", c.with_promo),
    ] {
        println!(
            "  {}: {} ({:.1}%)",
            label,
            count,
            percentage(count, c.total)
        );
    }
    println!();

    if let (Some(min), Some(max)) = (c.min_price, c.max_price) {
        println!("Prices:");
        println!("  Range: {} - {}", min, max);
        if let Some(avg) = c.average_price {
            println!("  Average: {:.2}", avg);
        }
        println!();
    }

    if !stats.top_brands.is_empty() {
        println!("Top Brands:");
        for brand in &stats.top_brands {
            println!("  {}: {}", brand.brand, brand.count);
        }
        println!();
    }

    if !stats.recent_jobs.is_empty() {
        println!("Recent Jobs:");
        for job in &stats.recent_jobs {
            println!(
                "  #{} {} {} at {}: {} page(s), {} committed{}",
                job.id,
                job.source,
                job.state,
                job.finished_at,
                job.pages_fetched,
                job.records_committed,
                job.reason
                    .as_deref()
                    .map(|r| format!(" ({})", r))
                    .unwrap_or_default()
            );
        }
    }
}
