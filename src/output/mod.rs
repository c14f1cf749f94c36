//! Output module for persisting harvested catalogs
//!
//! This module handles:
//! - Writing per-unit record files and per-term manifests
//! - Summarizing a batch for the terminal

mod jsonl;
pub mod stats;
mod traits;

pub use jsonl::JsonlSink;
pub use stats::{print_report, BatchReport};
pub use traits::{Manifest, OutputError, OutputResult, RecordSink};
