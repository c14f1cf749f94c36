//! Record extractor
//!
//! Turns the rows of a located course table into `CourseRecord`s. Rows that
//! do not look like course rows are skipped; partial tables are normal on
//! the portal.

use scraper::ElementRef;

use crate::catalog::{CategoryTag, CourseRecord, FacultyOverride, FacultyOverrides};
use crate::crawler::document::{cell_text, descendants_named, normalize_spaces};

/// Markup of the asterisk that flags faculty courses in the first cell
const ASTERISK_MARKERS: [&str; 2] = ["<center>&nbsp;*&nbsp;</center>", "<center> * </center>"];

/// Minimum number of cells in a course row
const MIN_CELLS: usize = 5;

/// Why a row was not turned into a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedRow {
    /// Fewer than five data cells
    TooFewCells(usize),

    /// Code cell is empty
    EmptyCode,

    /// Code cell has a subject but no number
    MissingNumber,
}

impl std::fmt::Display for MalformedRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewCells(n) => write!(f, "row has {} cells", n),
            Self::EmptyCode => write!(f, "empty course code"),
            Self::MissingNumber => write!(f, "course code has no number"),
        }
    }
}

/// Converts course tables into records
pub struct Extractor<'o> {
    overrides: &'o FacultyOverrides,
    apply_overrides: bool,
}

impl<'o> Extractor<'o> {
    pub fn new(overrides: &'o FacultyOverrides) -> Self {
        Self {
            overrides,
            apply_overrides: true,
        }
    }

    /// Disables the faculty-override lookup; every record then carries `No`
    pub fn without_overrides(mut self) -> Self {
        self.apply_overrides = false;
        self
    }

    /// Extracts every valid row of a table, in document order
    ///
    /// A leading row made of header cells is skipped. Duplicates are not
    /// removed here; callers merge through a `RecordSet`.
    pub fn extract(&self, table: ElementRef<'_>, category: CategoryTag) -> Vec<CourseRecord> {
        let mut rows = descendants_named(table, "tr").peekable();

        if let Some(first) = rows.peek() {
            if descendants_named(*first, "th").next().is_some() {
                rows.next();
            }
        }

        rows.filter_map(|row| match self.parse_row(row, category) {
            Ok(record) => Some(record),
            Err(reason) => {
                tracing::trace!("Skipping row: {}", reason);
                None
            }
        })
        .collect()
    }

    /// Parses one table row
    pub fn parse_row(
        &self,
        row: ElementRef<'_>,
        category: CategoryTag,
    ) -> Result<CourseRecord, MalformedRow> {
        let cells: Vec<ElementRef<'_>> = descendants_named(row, "td").collect();
        if cells.len() < MIN_CELLS {
            return Err(MalformedRow::TooFewCells(cells.len()));
        }

        let texts: Vec<String> = cells.iter().map(|c| cell_text(*c)).collect();
        if texts[1].is_empty() {
            return Err(MalformedRow::EmptyCode);
        }

        let code = normalize_spaces(&texts[1]);
        let mut tokens = code.split_whitespace();
        let subject = tokens
            .next()
            .map(str::to_uppercase)
            .ok_or(MalformedRow::EmptyCode)?;
        let number: String = tokens.collect();
        if number.is_empty() {
            return Err(MalformedRow::MissingNumber);
        }

        let faculty_override = if self.apply_overrides {
            FacultyOverride::from(self.overrides.faculty_for(&subject, &number))
        } else {
            FacultyOverride::No
        };
        let asterisk = has_asterisk(cells[0]);

        Ok(CourseRecord {
            category: effective_category(category, asterisk, &faculty_override),
            subject,
            number,
            name: texts[2].clone(),
            ects_credits: texts[3].clone(),
            engineering_credits: 0,
            basic_science_credits: 0,
            local_credits: texts[4].clone(),
            offering_faculty: texts.get(5).cloned().unwrap_or_default(),
            faculty_override,
        })
    }
}

/// True if a cell carries the centered asterisk marker
pub fn has_asterisk(cell: ElementRef<'_>) -> bool {
    let html = cell.html();
    ASTERISK_MARKERS.iter().any(|marker| html.contains(marker))
}

/// Category of a row after the faculty-override rule
///
/// Asterisk-marked faculty courses are never `required`: in a required
/// section they count as core electives. Area and free sections keep their
/// category, as do core sections.
pub fn effective_category(
    category: CategoryTag,
    asterisk: bool,
    faculty_override: &FacultyOverride,
) -> CategoryTag {
    if !(asterisk && faculty_override.is_override()) {
        return category;
    }
    match category {
        CategoryTag::Required => CategoryTag::Core,
        CategoryTag::Area => CategoryTag::Area,
        CategoryTag::Free => CategoryTag::Free,
        other => other,
    }
}
