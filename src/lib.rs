//! Catalog-Harvest: a resilient catalog crawler for a degree-catalog portal
//!
//! This crate fetches hand-authored degree-catalog pages, recovers the
//! requirement category of every course table on them, and turns the rows
//! into canonical, deduplicated course records.

pub mod catalog;
pub mod config;
pub mod crawler;
pub mod output;
pub mod portal;
pub mod terms;

use thiserror::Error;

/// Main error type for Catalog-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transport or status failure after every retry was spent
    #[error("Network error for {url}: {cause}")]
    Network { url: String, cause: String },

    /// The page was fetched but no course rows could be recovered from it
    #[error("No course records located for {unit}: {reason}")]
    StructuralMiss { unit: String, reason: String },

    /// The list of work units could not be resolved
    #[error("Listing error: {0}")]
    Listing(String),

    #[error("Invalid term code: {0}")]
    Term(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Catalog-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use catalog::{CategoryTag, Classification, CourseRecord, FacultyOverride};
pub use config::Config;
pub use crawler::{
    crawl, locate_categories, run_harvest, Coordinator, CrawlResult, FetchTarget, Fetcher, WorkUnit,
};
pub use output::{BatchReport, JsonlSink, RecordSink};
