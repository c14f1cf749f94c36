//! Batch report
//!
//! Summarizes a finished batch: which units succeeded with how many
//! records, which failed and why, and what the fetch layer did.

use crate::crawler::{FetchStats, WorkUnit};

/// Outcome counts of a batch
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Successful units and their record counts, in unit order
    pub succeeded: Vec<(WorkUnit, usize)>,

    /// Failed units and the proximate cause, in unit order
    pub failed: Vec<(WorkUnit, String)>,

    /// Total HTTP requests sent, retries included
    pub requests: u64,

    pub retries: u64,

    /// Highest number of simultaneous requests observed
    pub peak_in_flight: usize,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies the fetch-layer counters into the report
    pub fn with_fetch_stats(mut self, stats: &FetchStats) -> Self {
        self.requests = stats.requests();
        self.retries = stats.retries();
        self.peak_in_flight = stats.peak_in_flight();
        self
    }

    pub fn total_units(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn total_records(&self) -> usize {
        self.succeeded.iter().map(|(_, count)| count).sum()
    }

    /// Returns the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.total_units();
        if total == 0 {
            return 0.0;
        }
        (self.succeeded.len() as f64 / total as f64) * 100.0
    }

    /// Adds the units of another batch
    pub fn merge(&mut self, other: BatchReport) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
    }
}

/// Prints a report to stdout
pub fn print_report(report: &BatchReport) {
    println!("=== Harvest Report ===\n");

    println!("Overview:");
    println!("  Units crawled: {}", report.total_units());
    println!("  Succeeded: {}", report.succeeded.len());
    println!("  Failed: {}", report.failed.len());
    println!("  Records written: {}", report.total_records());
    println!(
        "  HTTP requests: {} ({} retries, peak {} in flight)",
        report.requests, report.retries, report.peak_in_flight
    );
    println!();

    if !report.succeeded.is_empty() {
        println!("Records per Unit:");
        for (unit, count) in &report.succeeded {
            println!("  {}: {}", unit, count);
        }
        println!();
    }

    if !report.failed.is_empty() {
        println!("Failures:");
        for (unit, cause) in &report.failed {
            println!("  {}: {}", unit, cause);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} units)",
        report.success_rate(),
        report.succeeded.len(),
        report.total_units()
    );
}
