use std::collections::{BTreeMap, HashMap};

use super::record::identity_key;

/// Built-in faculty course table
const DEFAULT_FACULTY_COURSES: &[(&str, &[&str])] = &[
    (
        "FENS",
        &[
            "CS201", "CS204", "DSA210", "EE200", "EE202", "ENS201", "ENS202", "ENS203", "ENS204",
            "ENS205", "ENS206", "ENS207", "ENS208", "ENS209", "ENS210", "ENS211", "ENS214",
            "ENS216", "MAT204", "MATH201", "MATH202", "MATH203", "MATH204", "NS201", "NS207",
            "NS213", "NS214", "NS216", "NS218", "PHYS211",
        ],
    ),
    (
        "FASS",
        &[
            "ANTH255", "ANTH326", "CULT368", "GEN341", "LIT212", "LIT359", "PHIL202", "PHIL321",
            "VA315", "ECON201", "ECON202", "ECON204", "HART292", "HART311", "HIST205", "HIST349",
            "PSY201", "PSY310", "PSY340", "IR201", "IR301", "IR391", "IR394", "POLS250",
            "POLS301", "SOC201", "SOC301", "HART213", "HART293", "VA201", "VA203", "VA312",
        ],
    ),
    (
        "SBS",
        &["ACC201", "FIN301", "MGMT402", "MKTG301", "OPIM302", "ORG301", "ORG302"],
    ),
];

/// Static lookup of courses known to belong to a specific faculty
#[derive(Debug, Clone)]
pub struct FacultyOverrides {
    by_course: HashMap<String, String>,
}

impl Default for FacultyOverrides {
    fn default() -> Self {
        let mut by_course = HashMap::new();
        for (faculty, courses) in DEFAULT_FACULTY_COURSES {
            for course in *courses {
                by_course
                    .entry(identity_key(course, ""))
                    .or_insert_with(|| faculty.to_string());
            }
        }
        Self { by_course }
    }
}

impl FacultyOverrides {
    /// Builds the lookup from a faculty → course codes table
    ///
    /// A course listed under several faculties keeps the first faculty in
    /// key order.
    pub fn from_table(table: &BTreeMap<String, Vec<String>>) -> Self {
        let mut by_course = HashMap::new();
        for (faculty, courses) in table {
            for course in courses {
                by_course
                    .entry(identity_key(course, ""))
                    .or_insert_with(|| faculty.clone());
            }
        }
        Self { by_course }
    }

    /// Returns an empty table (no course is ever overridden)
    pub fn empty() -> Self {
        Self {
            by_course: HashMap::new(),
        }
    }

    /// Looks up the faculty owning `subject` + `number`
    pub fn faculty_for(&self, subject: &str, number: &str) -> Option<&str> {
        self.by_course
            .get(&identity_key(subject, number))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_course.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_course.is_empty()
    }

    /// The built-in table in its configuration shape
    pub fn default_table() -> BTreeMap<String, Vec<String>> {
        DEFAULT_FACULTY_COURSES
            .iter()
            .map(|(faculty, courses)| {
                (
                    faculty.to_string(),
                    courses.iter().map(|c| c.to_string()).collect(),
                )
            })
            .collect()
    }
}
