//! Single work-unit crawl
//!
//! A work unit is one program catalog for one term. Crawling it means
//! fetching the detail page, locating its category sections, extracting the
//! rows of every section and following full-list links where the page only
//! links to its courses. Parsing happens synchronously between fetches; a
//! parsed document never lives across an await point.

use scraper::Html;
use std::collections::HashSet;
use std::fmt;
use url::Url;

use crate::catalog::{AnchorScheme, CategoryTag, Classification, CourseRecord, RecordSet};
use crate::crawler::extractor::Extractor;
use crate::crawler::fetcher::{FetchTarget, Session};
use crate::crawler::locator::{
    list_page_table, ListLink, Locator, LocatorLimits, SectionSource, DEFAULT_LIST_MARKER,
};
use crate::HarvestError;

/// Outcome of one work unit: a non-empty record list or the reason it failed
pub type CrawlResult = Result<Vec<CourseRecord>, HarvestError>;

/// Kind of program a work unit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProgramKind {
    Major,
    Minor,
}

impl ProgramKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
        }
    }
}

/// One (program, term) pair
///
/// Ordering is kind, then term, then program code, which is the order
/// results are written in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkUnit {
    pub kind: ProgramKind,
    pub term: String,
    pub program: String,

    /// Output name: the file stem for majors, the program code for minors
    pub label: String,
}

impl WorkUnit {
    pub fn major(program: impl Into<String>, term: impl Into<String>, stem: impl Into<String>) -> Self {
        Self {
            kind: ProgramKind::Major,
            term: term.into(),
            program: program.into(),
            label: stem.into(),
        }
    }

    pub fn minor(program: impl Into<String>, term: impl Into<String>) -> Self {
        let program = program.into();
        Self {
            kind: ProgramKind::Minor,
            term: term.into(),
            label: program.clone(),
            program,
        }
    }

    /// Identity used in logs and reports, e.g. `BSCS@202401`
    pub fn id(&self) -> String {
        format!("{}@{}", self.program, self.term)
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.id())
    }
}

/// How pages of one program kind are read
#[derive(Debug, Clone)]
pub struct PageProfile {
    pub limits: LocatorLimits,

    /// Anchor table that classifies the page's sections
    pub anchors: AnchorScheme,

    /// Whether the faculty-override table applies to this kind of page
    pub apply_overrides: bool,

    /// Substring identifying full-list links
    pub list_marker: String,
}

impl Default for PageProfile {
    fn default() -> Self {
        Self {
            limits: LocatorLimits::default(),
            anchors: AnchorScheme::Major,
            apply_overrides: true,
            list_marker: DEFAULT_LIST_MARKER.to_string(),
        }
    }
}

/// What a detail page yielded before any sub-page is fetched
#[derive(Debug, Default)]
pub struct PagePlan {
    /// Records and pending sub-pages, in section order
    pub steps: Vec<PlanStep>,

    /// Full-list links found by the page-wide sweep
    pub sweep_links: Vec<ListLink>,
}

#[derive(Debug)]
pub enum PlanStep {
    Records(Vec<CourseRecord>),
    ListPages(Vec<ListLink>),
}

/// Parses a detail page into owned extraction steps
pub fn plan_page(
    body: &str,
    base_url: Option<&Url>,
    profile: &PageProfile,
    classification: &Classification,
) -> PagePlan {
    let document = Html::parse_document(body);
    let mut locator = Locator::new(&classification.rules, profile.limits)
        .with_anchor_scheme(profile.anchors)
        .with_list_marker(&profile.list_marker);
    if let Some(base) = base_url {
        locator = locator.with_base_url(base);
    }
    let located = locator.locate(&document);
    let extractor = extractor_for(profile, classification);

    let steps = located
        .sections
        .into_iter()
        .map(|section| match section.source {
            SectionSource::Table(table) => {
                let records = extractor.extract(table, section.category);
                tracing::trace!(
                    anchor = %section.anchor,
                    category = %section.category,
                    "Extracted {} row(s)",
                    records.len()
                );
                PlanStep::Records(records)
            }
            SectionSource::ListPages(links) => PlanStep::ListPages(links),
        })
        .collect();

    PagePlan {
        steps,
        sweep_links: located.sweep_links,
    }
}

/// Extracts the course table of a full-list sub-page
pub fn extract_list_page(
    body: &str,
    category: CategoryTag,
    profile: &PageProfile,
    classification: &Classification,
) -> Vec<CourseRecord> {
    let document = Html::parse_document(body);
    match list_page_table(&document) {
        Some(table) => extractor_for(profile, classification).extract(table, category),
        None => Vec::new(),
    }
}

fn extractor_for<'c>(profile: &PageProfile, classification: &'c Classification) -> Extractor<'c> {
    let extractor = Extractor::new(&classification.overrides);
    if profile.apply_overrides {
        extractor
    } else {
        extractor.without_overrides()
    }
}

/// Crawls one detail page and every sub-page it depends on
///
/// Records are deduplicated across all sections and sub-pages of the unit,
/// first occurrence winning. A page that yields no records at all is a
/// `StructuralMiss`, not an empty success. A sub-page that cannot be fetched
/// fails the whole unit, so a catalog is never written with a category
/// silently missing.
pub async fn crawl(
    session: &Session,
    target: &FetchTarget,
    profile: &PageProfile,
    classification: &Classification,
) -> CrawlResult {
    let body = session.fetch(target).await?;
    let base_url = Url::parse(&target.url).ok();
    let plan = plan_page(&body, base_url.as_ref(), profile, classification);

    if plan.steps.is_empty() && plan.sweep_links.is_empty() {
        return Err(HarvestError::StructuralMiss {
            unit: target.url.clone(),
            reason: "no category anchors located".to_string(),
        });
    }

    let mut records = RecordSet::new();
    let mut fetched: HashSet<String> = HashSet::new();

    for step in plan.steps {
        match step {
            PlanStep::Records(rows) => {
                records.extend(rows);
            }
            PlanStep::ListPages(links) => {
                follow_links(session, &links, profile, classification, &mut fetched, &mut records)
                    .await?;
            }
        }
    }

    let before_sweep = records.len();
    follow_links(
        session,
        &plan.sweep_links,
        profile,
        classification,
        &mut fetched,
        &mut records,
    )
    .await?;
    if records.len() > before_sweep {
        tracing::debug!(
            "Page-wide sweep of {} recovered {} record(s)",
            target.url,
            records.len() - before_sweep
        );
    }

    if records.is_empty() {
        return Err(HarvestError::StructuralMiss {
            unit: target.url.clone(),
            reason: "no course rows in any located table".to_string(),
        });
    }

    Ok(records.into_records())
}

async fn follow_links(
    session: &Session,
    links: &[ListLink],
    profile: &PageProfile,
    classification: &Classification,
    fetched: &mut HashSet<String>,
    records: &mut RecordSet,
) -> Result<(), HarvestError> {
    for link in links {
        if !fetched.insert(link.url.clone()) {
            continue;
        }
        let body = session
            .fetch(&FetchTarget::get(link.url.as_str()))
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    worker = session.worker(),
                    category = %link.category,
                    "Course list failed: {}",
                    e
                )
            })?;
        let rows = extract_list_page(&body, link.category, profile, classification);
        let added = records.extend(rows);
        tracing::trace!(category = %link.category, "Sub-page {} added {} record(s)", link.url, added);
    }
    Ok(())
}
