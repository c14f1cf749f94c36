//! Output sink traits and types
//!
//! A sink persists the records of successful work units and the per-term
//! manifests derived from them.

use std::collections::BTreeMap;
use thiserror::Error;

use crate::catalog::CourseRecord;
use crate::crawler::{ProgramKind, WorkUnit};

/// Errors that can occur while writing output
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to serialize record: {0}")]
    Format(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Term → sorted names of the programs that succeeded in that term
pub type Manifest = BTreeMap<String, Vec<String>>;

/// Destination of crawl results
///
/// The coordinator calls the sink in sorted unit order, after every worker
/// has finished, so implementations need no synchronization.
pub trait RecordSink {
    /// Persists the records of one successful unit
    ///
    /// # Arguments
    ///
    /// * `unit` - The unit the records belong to
    /// * `records` - Deduplicated records in discovery order
    fn write_unit(&self, unit: &WorkUnit, records: &[CourseRecord]) -> OutputResult<()>;

    /// Persists the manifest of one program kind
    fn write_manifest(&self, kind: ProgramKind, manifest: &Manifest) -> OutputResult<()>;
}
