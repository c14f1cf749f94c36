//! Structural locator
//!
//! Finds category anchors (`<a name="...">`) in a catalog page and the
//! course table belonging to each one. Pages are hand-authored, so the
//! table is not always the anchor's sibling; the locator tries a fixed,
//! ordered list of in-page strategies and takes the first table that looks
//! like a course table:
//!
//! 1. Forward scan: the next few elements after the anchor
//! 2. Parent-table siblings: siblings following the table enclosing the anchor
//! 3. Table enumeration: the next few tables anywhere after the anchor
//!
//! When none succeeds, "full list" links near the anchor are returned so the
//! caller can fetch those sub-pages. Independently, every full-list link on
//! the page is collected by a page-wide sweep.

use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

use crate::catalog::{AnchorScheme, CategoryRules, CategoryTag};
use crate::crawler::document::{
    cell_text, descendants_named, is_tag, nearest_ancestor, next_sibling_elements,
    normalize_spaces, parent_element, PageIndex,
};

/// Course code at the start of a cell, e.g. `CS 201` or `MATH101`
static COURSE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]+\s*\d+").expect("course code pattern is valid"));

/// `P_AREA` query parameter of a full-list link
static AREA_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"P_AREA=([^&]+)").expect("area code pattern is valid"));

/// Default substring identifying full-list links
pub const DEFAULT_LIST_MARKER: &str = "p_list_courses";

/// Scan bounds for the locator strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorLimits {
    /// Elements examined by the forward scan
    pub forward_steps: usize,

    /// Tables examined by the table enumeration
    pub table_scan_limit: usize,

    /// Elements examined when looking for full-list links after an anchor
    pub link_scan_steps: usize,
}

impl Default for LocatorLimits {
    fn default() -> Self {
        Self {
            forward_steps: 10,
            table_scan_limit: 20,
            link_scan_steps: 15,
        }
    }
}

/// An in-page table search: `(index, anchor, limits) -> table`
pub type TableStrategy =
    for<'a> fn(&PageIndex<'a>, ElementRef<'a>, &LocatorLimits) -> Option<ElementRef<'a>>;

/// In-page strategies in the order they are tried
pub const TABLE_STRATEGIES: [(&str, TableStrategy); 3] = [
    ("forward-scan", forward_scan),
    ("parent-table-siblings", parent_table_siblings),
    ("table-enumeration", table_enumeration),
];

/// A link to a course-list sub-page and the category its rows receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListLink {
    pub url: String,
    pub category: CategoryTag,
}

/// Where the rows of one category section live
#[derive(Debug, Clone)]
pub enum SectionSource<'a> {
    /// A table in the page itself
    Table(ElementRef<'a>),

    /// Sub-pages that have to be fetched
    ListPages(Vec<ListLink>),
}

/// One located category section
#[derive(Debug, Clone)]
pub struct Section<'a> {
    /// The anchor's `name` attribute
    pub anchor: String,

    pub category: CategoryTag,

    pub source: SectionSource<'a>,
}

/// Everything the locator found on a page
#[derive(Debug, Clone, Default)]
pub struct Located<'a> {
    /// Sections in anchor order
    pub sections: Vec<Section<'a>>,

    /// Every full-list link on the page carrying an area code
    pub sweep_links: Vec<ListLink>,
}

impl Located<'_> {
    /// Categories of the located sections, in order
    pub fn categories(&self) -> Vec<CategoryTag> {
        self.sections.iter().map(|s| s.category).collect()
    }
}

/// Finds category sections in a catalog page
pub struct Locator<'r> {
    rules: &'r CategoryRules,
    scheme: AnchorScheme,
    limits: LocatorLimits,
    list_marker: &'r str,
    base_url: Option<&'r Url>,
}

impl<'r> Locator<'r> {
    pub fn new(rules: &'r CategoryRules, limits: LocatorLimits) -> Self {
        Self {
            rules,
            scheme: AnchorScheme::Major,
            limits,
            list_marker: DEFAULT_LIST_MARKER,
            base_url: None,
        }
    }

    /// Sets the anchor table used to classify sections
    pub fn with_anchor_scheme(mut self, scheme: AnchorScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Sets the substring identifying full-list links
    pub fn with_list_marker(mut self, marker: &'r str) -> Self {
        self.list_marker = marker;
        self
    }

    /// Sets the URL relative links are resolved against
    pub fn with_base_url(mut self, base_url: &'r Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Locates every category section of a document
    pub fn locate<'a>(&self, document: &'a Html) -> Located<'a> {
        let index = PageIndex::new(document);
        let mut sections = Vec::new();

        for anchor in index.named("a") {
            let Some(name) = anchor.value().attr("name") else {
                continue;
            };
            let title = anchor_title(&index, anchor);
            let Some(category) = self.rules.classify_anchor(self.scheme, name, &title) else {
                continue;
            };

            if let Some(table) = self.find_table(&index, anchor, name) {
                sections.push(Section {
                    anchor: name.to_string(),
                    category,
                    source: SectionSource::Table(table),
                });
                continue;
            }

            let links = self.nearby_list_links(&index, anchor, category);
            if links.is_empty() {
                tracing::debug!(anchor = name, %category, "No course table located for anchor");
                continue;
            }

            tracing::debug!(
                anchor = name,
                %category,
                "Falling back to {} full-list link(s)",
                links.len()
            );
            sections.push(Section {
                anchor: name.to_string(),
                category,
                source: SectionSource::ListPages(links),
            });
        }

        let sweep_links = self.sweep_list_links(&index);

        Located {
            sections,
            sweep_links,
        }
    }

    /// Tries the in-page strategies in order; the first hit wins
    fn find_table<'a>(
        &self,
        index: &PageIndex<'a>,
        anchor: ElementRef<'a>,
        name: &str,
    ) -> Option<ElementRef<'a>> {
        TABLE_STRATEGIES.iter().find_map(|(label, strategy)| {
            let table = strategy(index, anchor, &self.limits)?;
            tracing::trace!(anchor = name, strategy = label, "Located course table");
            Some(table)
        })
    }

    /// Full-list links next to an anchor
    ///
    /// Links inside the anchor's enclosing table are preferred; otherwise the
    /// siblings after the anchor's parent and the next few elements after the
    /// anchor are searched. A link's area code decides its category when it
    /// maps to a known one.
    fn nearby_list_links<'a>(
        &self,
        index: &PageIndex<'a>,
        anchor: ElementRef<'a>,
        anchor_category: CategoryTag,
    ) -> Vec<ListLink> {
        let mut found: Vec<ElementRef<'a>> = Vec::new();

        if let Some(table) = nearest_ancestor(anchor, "table") {
            found.extend(descendants_named(table, "a").filter(|a| self.is_list_link(*a)));
        }

        if found.is_empty() {
            if let Some(parent) = parent_element(anchor) {
                for sibling in next_sibling_elements(parent) {
                    found.extend(descendants_named(sibling, "a").filter(|a| self.is_list_link(*a)));
                }
                found.extend(
                    index
                        .following(anchor)
                        .take(self.limits.link_scan_steps)
                        .filter(|e| is_tag(*e, "a") && self.is_list_link(*e)),
                );
            }
        }

        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for link in found {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let category = match area_code(href) {
                Some(code) => {
                    let from_link = self.rules.link_category(&code);
                    if from_link.is_known() {
                        from_link
                    } else {
                        anchor_category
                    }
                }
                None => anchor_category,
            };
            let url = self.resolve(href);
            if seen.insert(url.clone()) {
                links.push(ListLink { url, category });
            }
        }
        links
    }

    /// Every full-list link on the page that carries an area code
    fn sweep_list_links(&self, index: &PageIndex<'_>) -> Vec<ListLink> {
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for link in index.named("a").filter(|a| self.is_list_link(*a)) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let Some(code) = area_code(href) else {
                continue;
            };
            let url = self.resolve(href);
            if seen.insert(url.clone()) {
                links.push(ListLink {
                    url,
                    category: self.rules.sweep_category(&code),
                });
            }
        }
        links
    }

    fn is_list_link(&self, element: ElementRef<'_>) -> bool {
        element
            .value()
            .attr("href")
            .is_some_and(|href| href.contains(self.list_marker))
    }

    fn resolve(&self, href: &str) -> String {
        match self.base_url.map(|base| base.join(href)) {
            Some(Ok(url)) => url.to_string(),
            _ => href.to_string(),
        }
    }
}

/// Categories of every located section in a document, using default limits
pub fn locate_categories(document: &Html, rules: &CategoryRules) -> Vec<CategoryTag> {
    Locator::new(rules, LocatorLimits::default())
        .locate(document)
        .categories()
}

/// Section title of an anchor: the first bold text in the anchor's parent,
/// or else the next bold element after it
fn anchor_title<'a>(index: &PageIndex<'a>, anchor: ElementRef<'a>) -> String {
    parent_element(anchor)
        .and_then(|parent| descendants_named(parent, "b").next())
        .or_else(|| index.following(anchor).find(|e| is_tag(*e, "b")))
        .map(cell_text)
        .unwrap_or_default()
}

fn area_code(href: &str) -> Option<String> {
    AREA_CODE
        .captures(href)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Heuristic for "this table lists courses"
///
/// Either the header cells name a course/name column, an ECTS column and a
/// credit column, or at least two rows have a course code in their second
/// cell.
pub fn looks_like_course_table(table: ElementRef<'_>) -> bool {
    let headers: Vec<String> = descendants_named(table, "th")
        .map(|th| cell_text(th).to_lowercase())
        .collect();

    let has_course = headers
        .iter()
        .any(|h| h.contains("course") || h.contains("name"));
    let has_ects = headers.iter().any(|h| h.contains("ects"));
    let has_credit = headers
        .iter()
        .any(|h| h.contains("credit") || h.contains("hours"));
    if has_course && has_ects && has_credit {
        return true;
    }

    descendants_named(table, "tr")
        .filter(|row| has_course_code(*row))
        .take(2)
        .count()
        >= 2
}

fn has_course_code(row: ElementRef<'_>) -> bool {
    let cells: Vec<ElementRef<'_>> = descendants_named(row, "td").collect();
    if cells.len() < 5 {
        return false;
    }
    let code = normalize_spaces(&cell_text(cells[1]));
    COURSE_CODE.is_match(&code)
}

/// Strategy 1: the next `forward_steps` elements after the anchor
pub fn forward_scan<'a>(
    index: &PageIndex<'a>,
    anchor: ElementRef<'a>,
    limits: &LocatorLimits,
) -> Option<ElementRef<'a>> {
    index
        .following(anchor)
        .take(limits.forward_steps)
        .filter(|e| is_tag(*e, "table"))
        .find(|table| looks_like_course_table(*table))
}

/// Strategy 2: siblings after the table enclosing the anchor, or tables
/// nested inside them
pub fn parent_table_siblings<'a>(
    _index: &PageIndex<'a>,
    anchor: ElementRef<'a>,
    _limits: &LocatorLimits,
) -> Option<ElementRef<'a>> {
    let enclosing = nearest_ancestor(anchor, "table")?;

    next_sibling_elements(enclosing).find_map(|sibling| {
        if is_tag(sibling, "table") && looks_like_course_table(sibling) {
            return Some(sibling);
        }
        descendants_named(sibling, "table").find(|table| looks_like_course_table(*table))
    })
}

/// Strategy 3: the next `table_scan_limit` tables anywhere after the anchor
pub fn table_enumeration<'a>(
    index: &PageIndex<'a>,
    anchor: ElementRef<'a>,
    limits: &LocatorLimits,
) -> Option<ElementRef<'a>> {
    index
        .following(anchor)
        .filter(|e| is_tag(*e, "table"))
        .take(limits.table_scan_limit)
        .find(|table| looks_like_course_table(*table))
}

/// Course table of a full-list sub-page: the first table that looks like a
/// course table, else the first table
pub fn list_page_table(document: &Html) -> Option<ElementRef<'_>> {
    let index = PageIndex::new(document);
    let mut tables = index.named("table").peekable();
    let first = tables.peek().copied();
    tables.find(|t| looks_like_course_table(*t)).or(first)
}
