//! Crawler module for catalog fetching and extraction
//!
//! This module contains the crawl-and-extract engine:
//! - HTTP fetching with retry, backoff and a global in-flight bound
//! - Locating category sections and their course tables
//! - Extracting course records from located tables
//! - Crawling one work unit, and orchestrating batches of them

mod coordinator;
mod document;
mod extractor;
mod fetcher;
mod locator;
mod program;

pub use coordinator::{run_harvest, BatchOutcome, Coordinator};
pub use document::PageIndex;
pub use extractor::{effective_category, has_asterisk, Extractor, MalformedRow};
pub use fetcher::{
    backoff_delay, build_http_client, FetchConfig, FetchStats, FetchTarget, Fetcher, Session,
};
pub use locator::{
    forward_scan, list_page_table, locate_categories, looks_like_course_table,
    parent_table_siblings, table_enumeration, ListLink, Located, Locator, LocatorLimits, Section,
    SectionSource, TableStrategy, DEFAULT_LIST_MARKER, TABLE_STRATEGIES,
};
pub use program::{
    crawl, extract_list_page, plan_page, CrawlResult, PagePlan, PageProfile, PlanStep, ProgramKind,
    WorkUnit,
};
