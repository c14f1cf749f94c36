use serde::{Deserialize, Serialize};
use std::fmt;

/// The degree-requirement bucket a course belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryTag {
    Required,
    Core,
    Area,
    Free,
    University,
    Unknown,
}

impl CategoryTag {
    /// Returns the wire name of the category
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Core => "core",
            Self::Area => "area",
            Self::Free => "free",
            Self::University => "university",
            Self::Unknown => "unknown",
        }
    }

    /// Returns true unless the category is `Unknown`
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for CategoryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an anchor name or area code is matched against a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamePattern {
    Exact(&'static str),
    Prefix(&'static str),
    Suffix(&'static str),
    Contains(&'static str),
}

impl NamePattern {
    /// Tests the pattern against a name
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(p) => name == *p,
            Self::Prefix(p) => name.starts_with(p),
            Self::Suffix(p) => name.ends_with(p),
            Self::Contains(p) => name.contains(p),
        }
    }
}

/// Which anchor table classifies a page's sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorScheme {
    /// Major catalogs: marker list, suffix table, then the section title
    #[default]
    Major,

    /// Minor catalogs: a single table; anchors it does not map are skipped
    Minor,
}

/// Category mapping tables for anchor names and list-link area codes
///
/// Each table is evaluated in order and the first matching pattern wins.
/// The default tables are the portal's load-bearing business rules; every
/// synonym suffix is significant.
#[derive(Debug, Clone)]
pub struct CategoryRules {
    /// Anchor names that open a category section
    pub anchor_markers: Vec<NamePattern>,

    /// Anchor name → category; anchors matching nothing fall back to their title
    pub anchor_categories: Vec<(NamePattern, CategoryTag)>,

    /// Anchor name → category on minor pages; required synonyms come first
    pub minor_anchor_categories: Vec<(NamePattern, CategoryTag)>,

    /// `P_AREA` code of a list link found next to an anchor
    pub link_categories: Vec<(NamePattern, CategoryTag)>,

    /// `P_AREA` code of a list link found by the page-wide sweep
    pub sweep_categories: Vec<(NamePattern, CategoryTag)>,
}

impl Default for CategoryRules {
    fn default() -> Self {
        use CategoryTag::*;
        use NamePattern::*;

        let anchor_markers = vec![
            Suffix("_CEL"),
            Suffix("_REQ"),
            Suffix("_AEL"),
            Suffix("_FEL"),
            Suffix("_ARE"),
            Suffix("_FRE"),
            Exact("UC_FENS"),
            Exact("UC_FASS"),
            Prefix("main"),
            Contains("_COR"),
            Contains("_C1"),
            Contains("_C2"),
            Contains("_CE1"),
            Contains("_CE2"),
            Contains("_PHL"),
            Contains("_MEL"),
        ];

        let anchor_categories = vec![
            (Suffix("_CEL"), Core),
            (Contains("_COR"), Core),
            (Contains("_CE1"), Core),
            (Contains("_C1"), Core),
            (Suffix("_CE2"), Core),
            (Suffix("_C2"), Core),
            (Suffix("_REQ"), Required),
            (Suffix("_MEL"), Required),
            (Suffix("_PHL"), Required),
            (Suffix("_AEL"), Area),
            (Suffix("_ARE"), Area),
            (Suffix("_FEL"), Free),
            (Suffix("_FRE"), Free),
            (Exact("UC_FENS"), University),
            (Exact("UC_FASS"), University),
        ];

        let minor_anchor_categories = vec![
            (Suffix("_REQ"), Required),
            (Contains("_PHL"), Required),
            (Contains("_MEL"), Required),
            (Suffix("_CEL"), Core),
            (Contains("_COR"), Core),
            (Contains("_CE1"), Core),
            (Contains("_C1"), Core),
            (Contains("_CE2"), Core),
            (Contains("_C2"), Core),
            (Suffix("_ARE"), Area),
            (Suffix("_AEL"), Area),
            (Suffix("_FRE"), Free),
            (Suffix("_FEL"), Free),
            (Exact("UC_FENS"), University),
            (Exact("UC_FASS"), University),
        ];

        let core_codes = [
            (Contains("_CEL"), Core),
            (Contains("_COR"), Core),
            (Contains("_CE1"), Core),
            (Contains("_C1"), Core),
            (Contains("_CE2"), Core),
            (Contains("_C2"), Core),
        ];
        let area_and_free = [
            (Contains("_AEL"), Area),
            (Contains("_ARE"), Area),
            (Contains("_FEL"), Free),
            (Contains("_FRE"), Free),
        ];

        let mut link_categories = core_codes.to_vec();
        link_categories.extend([
            (Contains("_REQ"), Required),
            (Contains("_MEL"), Required),
            (Contains("_PHL"), Required),
        ]);
        link_categories.extend(area_and_free);
        link_categories.push((Contains("UC_"), University));

        // The sweep checks the university prefix before the _PHL/_MEL synonyms
        let mut sweep_categories = core_codes.to_vec();
        sweep_categories.push((Contains("_REQ"), Required));
        sweep_categories.extend(area_and_free);
        sweep_categories.extend([
            (Contains("UC_"), University),
            (Contains("_PHL"), Required),
            (Contains("_MEL"), Required),
        ]);

        Self {
            anchor_markers,
            anchor_categories,
            minor_anchor_categories,
            link_categories,
            sweep_categories,
        }
    }
}

impl CategoryRules {
    /// Returns true if the anchor name marks the start of a category section
    pub fn is_category_anchor(&self, name: &str) -> bool {
        self.anchor_markers.iter().any(|p| p.matches(name))
    }

    /// Derives an anchor's category, consulting the section title when the
    /// name carries no known code
    pub fn anchor_category(&self, name: &str, title: &str) -> CategoryTag {
        first_match(&self.anchor_categories, name).unwrap_or_else(|| category_from_title(title))
    }

    /// Classifies an anchor under the given scheme
    ///
    /// Returns `None` when the anchor does not open a category section.
    pub fn classify_anchor(
        &self,
        scheme: AnchorScheme,
        name: &str,
        title: &str,
    ) -> Option<CategoryTag> {
        match scheme {
            AnchorScheme::Major => self
                .is_category_anchor(name)
                .then(|| self.anchor_category(name, title)),
            AnchorScheme::Minor => first_match(&self.minor_anchor_categories, name),
        }
    }

    /// Category of a list link discovered next to an anchor
    pub fn link_category(&self, area_code: &str) -> CategoryTag {
        first_match(&self.link_categories, area_code).unwrap_or(CategoryTag::Unknown)
    }

    /// Category of a list link discovered by the page-wide sweep
    pub fn sweep_category(&self, area_code: &str) -> CategoryTag {
        first_match(&self.sweep_categories, area_code).unwrap_or(CategoryTag::Unknown)
    }
}

fn first_match(table: &[(NamePattern, CategoryTag)], name: &str) -> Option<CategoryTag> {
    table
        .iter()
        .find(|(pattern, _)| pattern.matches(name))
        .map(|(_, category)| *category)
}

/// Maps a section title to a category by keyword
///
/// A title that is exactly `total` maps to `University`: university course
/// sections are rendered under a "Total" heading on the portal.
pub fn category_from_title(title: &str) -> CategoryTag {
    let t = title.to_lowercase();

    if t.contains("university") && t.contains("courses") {
        return CategoryTag::University;
    }
    if t.contains("required") && t.contains("courses") {
        return CategoryTag::Required;
    }
    if t.contains("core") && t.contains("elective") {
        return CategoryTag::Core;
    }
    if t.contains("area") && t.contains("elective") {
        return CategoryTag::Area;
    }
    if t.contains("free") && t.contains("elective") {
        return CategoryTag::Free;
    }
    if t == "total" {
        return CategoryTag::University;
    }
    CategoryTag::Unknown
}
