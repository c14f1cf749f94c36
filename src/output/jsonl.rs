//! JSON-lines sink
//!
//! Layout under the courses directory:
//!
//! ```text
//! {term}/{stem}.jsonl           records of one major
//! terms.jsonl                   {"term", "majors"} per term
//! minors/{term}/{code}.jsonl    records of one minor
//! minors/terms.jsonl            {"term", "minors"} per term
//! ```

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::traits::{Manifest, OutputError, OutputResult, RecordSink};
use crate::catalog::CourseRecord;
use crate::crawler::{ProgramKind, WorkUnit};

const MANIFEST_FILE: &str = "terms.jsonl";
const MINORS_DIR: &str = "minors";

#[derive(Serialize)]
struct MajorsLine<'a> {
    term: &'a str,
    majors: &'a [String],
}

#[derive(Serialize)]
struct MinorsLine<'a> {
    term: &'a str,
    minors: &'a [String],
}

/// Writes one JSON object per line
#[derive(Debug, Clone)]
pub struct JsonlSink {
    root: PathBuf,
}

impl JsonlSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File a unit's records are written to
    pub fn unit_path(&self, unit: &WorkUnit) -> PathBuf {
        let file = format!("{}.jsonl", unit.label);
        match unit.kind {
            ProgramKind::Major => self.root.join(&unit.term).join(file),
            ProgramKind::Minor => self.root.join(MINORS_DIR).join(&unit.term).join(file),
        }
    }

    pub fn manifest_path(&self, kind: ProgramKind) -> PathBuf {
        match kind {
            ProgramKind::Major => self.root.join(MANIFEST_FILE),
            ProgramKind::Minor => self.root.join(MINORS_DIR).join(MANIFEST_FILE),
        }
    }
}

impl RecordSink for JsonlSink {
    fn write_unit(&self, unit: &WorkUnit, records: &[CourseRecord]) -> OutputResult<()> {
        let mut sorted: Vec<&CourseRecord> = records.iter().collect();
        sorted.sort_by_key(|record| record.identity_key());

        let lines = sorted
            .into_iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;

        write_lines(&self.unit_path(unit), &lines)
    }

    fn write_manifest(&self, kind: ProgramKind, manifest: &Manifest) -> OutputResult<()> {
        let lines = manifest
            .iter()
            .map(|(term, programs)| match kind {
                ProgramKind::Major => serde_json::to_string(&MajorsLine {
                    term,
                    majors: programs,
                }),
                ProgramKind::Minor => serde_json::to_string(&MinorsLine {
                    term,
                    minors: programs,
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        write_lines(&self.manifest_path(kind), &lines)
    }
}

fn write_lines(path: &Path, lines: &[String]) -> OutputResult<()> {
    let to_error = |source| OutputError::Write {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(to_error)?;
    }

    let mut contents = String::new();
    for line in lines {
        contents.push_str(line);
        contents.push('\n');
    }
    fs::write(path, contents).map_err(to_error)?;

    tracing::debug!("Wrote {} line(s) to {}", lines.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CategoryTag, FacultyOverride};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn record(subject: &str, number: &str) -> CourseRecord {
        CourseRecord {
            subject: subject.to_string(),
            number: number.to_string(),
            name: "Course".to_string(),
            ects_credits: "6".to_string(),
            engineering_credits: 0,
            basic_science_credits: 0,
            local_credits: "3".to_string(),
            offering_faculty: String::new(),
            category: CategoryTag::Required,
            faculty_override: FacultyOverride::No,
        }
    }

    #[test]
    fn test_unit_paths() {
        let sink = JsonlSink::new("/out");
        assert_eq!(
            sink.unit_path(&WorkUnit::major("BSCS", "202401", "CS")),
            PathBuf::from("/out/202401/CS.jsonl")
        );
        assert_eq!(
            sink.unit_path(&WorkUnit::minor("MINBA", "202401")),
            PathBuf::from("/out/minors/202401/MINBA.jsonl")
        );
    }

    #[test]
    fn test_write_unit_sorts_by_identity() {
        let dir = TempDir::new().unwrap();
        let sink = JsonlSink::new(dir.path());
        let unit = WorkUnit::major("BSCS", "202401", "CS");

        sink.write_unit(&unit, &[record("MATH", "101"), record("CS", "201")])
            .unwrap();

        let contents = fs::read_to_string(sink.unit_path(&unit)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            r#"{"Major":"CS","Code":"201","Course_Name":"Course","ECTS":"6","Engineering":0,"Basic_Science":0,"SU_credit":"3","Faculty":"","EL_Type":"required","Faculty_Course":"No"}"#
        );
        assert!(lines[1].starts_with(r#"{"Major":"MATH""#));
    }

    #[test]
    fn test_write_manifests() {
        let dir = TempDir::new().unwrap();
        let sink = JsonlSink::new(dir.path());

        let mut manifest = BTreeMap::new();
        manifest.insert("202402".to_string(), vec!["CS".to_string()]);
        manifest.insert(
            "202401".to_string(),
            vec!["BIO".to_string(), "CS".to_string()],
        );
        sink.write_manifest(ProgramKind::Major, &manifest).unwrap();
        sink.write_manifest(ProgramKind::Minor, &manifest).unwrap();

        let majors = fs::read_to_string(dir.path().join("terms.jsonl")).unwrap();
        assert_eq!(
            majors,
            "{\"term\":\"202401\",\"majors\":[\"BIO\",\"CS\"]}\n{\"term\":\"202402\",\"majors\":[\"CS\"]}\n"
        );
        let minors = fs::read_to_string(dir.path().join("minors/terms.jsonl")).unwrap();
        assert!(minors.starts_with("{\"term\":\"202401\",\"minors\""));
    }
}
