use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::category::CategoryTag;

/// Whether a course is on the faculty override list, and for which faculty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FacultyOverride {
    No,
    Faculty(String),
}

impl FacultyOverride {
    pub fn is_override(&self) -> bool {
        matches!(self, Self::Faculty(_))
    }
}

impl From<String> for FacultyOverride {
    fn from(value: String) -> Self {
        if value == "No" {
            Self::No
        } else {
            Self::Faculty(value)
        }
    }
}

impl From<FacultyOverride> for String {
    fn from(value: FacultyOverride) -> Self {
        match value {
            FacultyOverride::No => "No".to_string(),
            FacultyOverride::Faculty(name) => name,
        }
    }
}

impl From<Option<&str>> for FacultyOverride {
    fn from(value: Option<&str>) -> Self {
        match value {
            Some(faculty) => Self::Faculty(faculty.to_string()),
            None => Self::No,
        }
    }
}

/// One canonical course entry of a catalog
///
/// Field names on the wire follow the record format consumed by the
/// curriculum tooling downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    /// Uppercase subject code, e.g. `CS`
    #[serde(rename = "Major")]
    pub subject: String,

    /// Course number, e.g. `201`
    #[serde(rename = "Code")]
    pub number: String,

    #[serde(rename = "Course_Name")]
    pub name: String,

    /// ECTS credits, kept verbatim
    #[serde(rename = "ECTS")]
    pub ects_credits: String,

    /// Filled in by the course-page enrichment pass
    #[serde(rename = "Engineering")]
    pub engineering_credits: u32,

    /// Filled in by the course-page enrichment pass
    #[serde(rename = "Basic_Science")]
    pub basic_science_credits: u32,

    /// Credits in the institution's own unit
    #[serde(rename = "SU_credit")]
    pub local_credits: String,

    #[serde(rename = "Faculty")]
    pub offering_faculty: String,

    #[serde(rename = "EL_Type")]
    pub category: CategoryTag,

    #[serde(rename = "Faculty_Course")]
    pub faculty_override: FacultyOverride,
}

impl CourseRecord {
    /// The normalized `subject + number` key used for deduplication
    pub fn identity_key(&self) -> String {
        identity_key(&self.subject, &self.number)
    }
}

/// Normalizes a subject and number into an identity key
///
/// The key is uppercase with all whitespace removed, so `cs 201` and
/// `CS201` collide.
pub fn identity_key(subject: &str, number: &str) -> String {
    subject
        .chars()
        .chain(number.chars())
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Insertion-ordered record collection where the first occurrence of an
/// identity key wins
#[derive(Debug, Default)]
pub struct RecordSet {
    records: Vec<CourseRecord>,
    seen: HashSet<String>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record unless its identity key was already seen
    ///
    /// Returns true if the record was added.
    pub fn insert(&mut self, record: CourseRecord) -> bool {
        if !self.seen.insert(record.identity_key()) {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Adds every record in order, returning how many were new
    pub fn extend<I: IntoIterator<Item = CourseRecord>>(&mut self, records: I) -> usize {
        records
            .into_iter()
            .map(|record| self.insert(record))
            .filter(|added| *added)
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<CourseRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(subject: &str, number: &str, category: CategoryTag) -> CourseRecord {
        CourseRecord {
            subject: subject.to_string(),
            number: number.to_string(),
            name: String::new(),
            ects_credits: "6".to_string(),
            engineering_credits: 0,
            basic_science_credits: 0,
            local_credits: "3".to_string(),
            offering_faculty: String::new(),
            category,
            faculty_override: FacultyOverride::No,
        }
    }

    #[test]
    fn test_identity_key_normalization() {
        assert_eq!(identity_key("cs", " 201 "), "CS201");
        assert_eq!(identity_key("MATH", "10 1"), "MATH101");
    }

    #[test]
    fn test_first_occurrence_wins() {
        let mut set = RecordSet::new();
        assert!(set.insert(record("CS", "201", CategoryTag::Required)));
        assert!(!set.insert(record("cs", "201", CategoryTag::Core)));
        assert!(set.insert(record("CS", "204", CategoryTag::Core)));

        let records = set.into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].category, CategoryTag::Required);
        assert_eq!(records[1].number, "204");
    }

    #[test]
    fn test_extend_counts_new_records() {
        let mut set = RecordSet::new();
        set.insert(record("CS", "201", CategoryTag::Required));
        let added = set.extend(vec![
            record("CS", "201", CategoryTag::Free),
            record("CS", "300", CategoryTag::Free),
        ]);
        assert_eq!(added, 1);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_wire_format() {
        let mut rec = record("CS", "201", CategoryTag::Core);
        rec.faculty_override = FacultyOverride::Faculty("FENS".to_string());
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["Major"], "CS");
        assert_eq!(json["Code"], "201");
        assert_eq!(json["EL_Type"], "core");
        assert_eq!(json["Faculty_Course"], "FENS");
        assert_eq!(json["SU_credit"], "3");

        let back: CourseRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn test_enrichment_placeholders_are_integers() {
        let rec = record("CS", "201", CategoryTag::Core);
        let line = serde_json::to_string(&rec).unwrap();
        assert!(line.contains(r#""Engineering":0,"Basic_Science":0,"#));

        let json = serde_json::to_value(&rec).unwrap();
        assert!(json["Engineering"].is_u64());
    }

    #[test]
    fn test_no_override_serializes_as_no() {
        let json = serde_json::to_value(record("CS", "300", CategoryTag::Area)).unwrap();
        assert_eq!(json["Faculty_Course"], "No");
    }
}
