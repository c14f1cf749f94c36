//! Degree-catalog portal
//!
//! URL templates of the origin's pages and parsing of the program listing.

use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use url::Url;

use crate::config::PortalConfig;
use crate::crawler::{FetchTarget, ProgramKind};
use crate::HarvestError;

static PROGRAM_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"P_PROGRAM=([^&]+)").expect("program code pattern is valid"));

const LIST_PAGE: &str = "SU_DEGREE.p_list_degree";
const DETAIL_PAGE: &str = "SU_DEGREE.p_degree_detail";

/// One program in the portal's listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramEntry {
    pub code: String,
    pub name: String,
}

/// Builds requests against the portal
#[derive(Debug, Clone)]
pub struct Portal {
    base_url: Url,
    language: String,
    level: String,
}

impl Portal {
    pub fn new(config: &PortalConfig) -> Result<Self, HarvestError> {
        let mut base_url = Url::parse(&config.base_url)?;
        // Page names are relative to the base directory
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            language: config.language.clone(),
            level: config.level.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Listing page of every program of a kind
    pub fn program_list(&self, kind: ProgramKind) -> Result<FetchTarget, HarvestError> {
        let program_type = match kind {
            ProgramKind::Major => "",
            ProgramKind::Minor => "MINOR",
        };
        let mut url = self.base_url.join(LIST_PAGE)?;
        url.query_pairs_mut()
            .append_pair("P_LEVEL", &self.level)
            .append_pair("P_LANG", &self.language)
            .append_pair("P_PRG_TYPE", program_type);
        Ok(FetchTarget::get(url.as_str()))
    }

    /// Catalog page of a program for a term
    pub fn degree_detail(&self, program: &str, term: &str) -> Result<FetchTarget, HarvestError> {
        let mut url = self.base_url.join(DETAIL_PAGE)?;
        url.query_pairs_mut()
            .append_pair("P_PROGRAM", program)
            .append_pair("P_LANG", &self.language)
            .append_pair("P_LEVEL", &self.level)
            .append_pair("P_TERM", term)
            .append_pair("P_SUBMIT", "Select");
        Ok(FetchTarget::get(url.as_str()))
    }
}

/// Programs linked from a listing page, sorted by code
///
/// Links without a visible name are ignored. A code listed twice keeps its
/// last name.
pub fn parse_program_listing(html: &str) -> Vec<ProgramEntry> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(r#"a[href*="P_PROGRAM="]"#) else {
        return Vec::new();
    };

    let mut programs = BTreeMap::new();
    for link in document.select(&selector) {
        let Some(code) = link
            .value()
            .attr("href")
            .and_then(|href| PROGRAM_CODE.captures(href))
            .and_then(|caps| caps.get(1))
        else {
            continue;
        };
        let name: String = link.text().map(str::trim).collect();
        if code.as_str().is_empty() || name.is_empty() {
            continue;
        }
        programs.insert(code.as_str().to_string(), name);
    }

    programs
        .into_iter()
        .map(|(code, name)| ProgramEntry { code, name })
        .collect()
}
