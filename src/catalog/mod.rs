//! Catalog data model
//!
//! This module holds everything the crawler needs to know about the
//! catalog's business rules:
//! - `CategoryTag`: the requirement bucket a course belongs to
//! - `CategoryRules`: anchor-name and area-code mappings plus title heuristics
//! - `FacultyOverrides`: courses owned by a specific faculty
//! - `CourseRecord`: the canonical output record
//!
//! The tables are immutable values built once at start-up and passed by
//! reference into the locator and extractor.

mod category;
mod overrides;
mod record;

pub use category::{category_from_title, AnchorScheme, CategoryRules, CategoryTag, NamePattern};
pub use overrides::FacultyOverrides;
pub use record::{identity_key, CourseRecord, FacultyOverride, RecordSet};

use std::collections::BTreeMap;

/// The immutable classification tables shared by every worker
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// Anchor and link code mappings
    pub rules: CategoryRules,

    /// Course → faculty lookup used by the asterisk rule
    pub overrides: FacultyOverrides,
}

impl Classification {
    /// Builds the classification with the built-in rules and the given faculty table
    pub fn with_faculty_courses(faculty_courses: &BTreeMap<String, Vec<String>>) -> Self {
        Self {
            rules: CategoryRules::default(),
            overrides: FacultyOverrides::from_table(faculty_courses),
        }
    }
}
