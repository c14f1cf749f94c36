//! Academic term codes
//!
//! Term codes are `YYYYSS` where `YYYY` is the first calendar year of the
//! academic year and `SS` is `01` (Fall), `02` (Spring) or `03` (Summer).

use chrono::{Datelike, FixedOffset, NaiveDate, Utc};

use crate::HarvestError;

/// Season suffixes in academic-year order
const SUFFIX_ORDER: [&str; 3] = ["01", "02", "03"];

/// The portal runs on UTC+03:00 all year round
const PORTAL_UTC_OFFSET_SECS: i32 = 3 * 3600;

/// Parses a term code into (academic start year, suffix index)
pub fn parse_term_code(code: &str) -> Option<(i32, usize)> {
    let code = code.trim();
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year = code[..4].parse().ok()?;
    let suffix = SUFFIX_ORDER.iter().position(|s| *s == &code[4..])?;
    Some((year, suffix))
}

/// Term name for a date, e.g. `Spring 2024-2025`
///
/// - Jan 1 – Jan 19: Fall of the previous academic year
/// - Jan 20 – Jun 19: Spring
/// - Jun 20 – Aug 31: Summer
/// - Sep 1 – Dec 31: Fall of the academic year starting this year
pub fn term_name_from_date(date: NaiveDate) -> String {
    let (season, start) = season_for(date);
    let name = match season {
        0 => "Fall",
        1 => "Spring",
        _ => "Summer",
    };
    format!("{} {}-{}", name, start, start + 1)
}

/// Term code for a date
pub fn term_code_from_date(date: NaiveDate) -> String {
    let (season, start) = season_for(date);
    format!("{}{}", start, SUFFIX_ORDER[season])
}

fn season_for(date: NaiveDate) -> (usize, i32) {
    let (year, month, day) = (date.year(), date.month(), date.day());

    if month == 1 && day < 20 {
        (0, year - 1)
    } else if month < 6 || (month == 6 && day < 20) {
        (1, year - 1)
    } else if month < 9 {
        (2, year - 1)
    } else {
        (0, year)
    }
}

/// Today's date in the portal's time zone
pub fn today_at_portal() -> NaiveDate {
    match FixedOffset::east_opt(PORTAL_UTC_OFFSET_SECS) {
        Some(offset) => Utc::now().with_timezone(&offset).date_naive(),
        None => Utc::now().date_naive(),
    }
}

/// Enumerates every term code from `{start_year}01` through the given term
///
/// When `through` is `None` the term containing `today` is the last one.
pub fn generate_terms(
    start_year: i32,
    through: Option<&str>,
    today: NaiveDate,
) -> Result<Vec<String>, HarvestError> {
    let (end_year, end_suffix) = match through {
        Some(code) => {
            parse_term_code(code).ok_or_else(|| HarvestError::Term(code.to_string()))?
        }
        None => {
            let code = term_code_from_date(today);
            parse_term_code(&code).ok_or(HarvestError::Term(code))?
        }
    };

    if end_year < start_year {
        return Ok(Vec::new());
    }

    let mut terms = Vec::new();
    for year in start_year..=end_year {
        let last = if year < end_year {
            SUFFIX_ORDER.len() - 1
        } else {
            end_suffix
        };
        for suffix in &SUFFIX_ORDER[..=last] {
            terms.push(format!("{}{}", year, suffix));
        }
    }
    Ok(terms)
}
