use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::catalog::FacultyOverrides;

/// Main configuration structure for Catalog-Harvest
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub portal: PortalConfig,
    pub http: HttpConfig,
    pub crawl: CrawlConfig,
    pub output: OutputConfig,

    /// Major program code → output file stem
    pub programs: BTreeMap<String, String>,

    /// Faculty → course codes owned by that faculty
    #[serde(rename = "faculty-courses")]
    pub faculty_courses: BTreeMap<String, Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            portal: PortalConfig::default(),
            http: HttpConfig::default(),
            crawl: CrawlConfig::default(),
            output: OutputConfig::default(),
            programs: default_programs(),
            faculty_courses: FacultyOverrides::default_table(),
        }
    }
}

/// Origin portal settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Base URL every page template is resolved against
    #[serde(rename = "base-url")]
    pub base_url: String,

    pub language: String,

    pub level: String,

    /// Substring identifying links to course-list sub-pages
    #[serde(rename = "list-marker")]
    pub list_marker: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://suis.sabanciuniv.edu/prod/".to_string(),
            language: "EN".to_string(),
            level: "UG".to_string(),
            list_marker: "p_list_courses".to_string(),
        }
    }
}

/// Fetch layer settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: f64,

    /// Additional attempts after the first failure
    pub retries: u32,

    /// Base of the exponential backoff (seconds)
    #[serde(rename = "backoff-secs")]
    pub backoff_secs: f64,

    /// Maximum simultaneous requests across all workers
    #[serde(rename = "max-in-flight")]
    pub max_in_flight: usize,

    /// Pause after every successful request (seconds)
    #[serde(rename = "sleep-secs")]
    pub sleep_secs: f64,

    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30.0,
            retries: 2,
            backoff_secs: 0.5,
            max_in_flight: 6,
            sleep_secs: 0.0,
            user_agent: format!("catalog-harvest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs_f64(self.backoff_secs)
    }

    pub fn politeness_delay(&self) -> Duration {
        Duration::from_secs_f64(self.sleep_secs)
    }
}

/// Crawl orchestration and locator settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Parallel logical crawl sequences
    pub workers: usize,

    /// Explicit term codes; generated from `start-year` when empty
    pub terms: Vec<String>,

    #[serde(rename = "start-year")]
    pub start_year: i32,

    /// Last term to generate; defaults to the current term
    #[serde(rename = "through-term")]
    pub through_term: Option<String>,

    /// Limit on processed terms (0 = unlimited)
    #[serde(rename = "max-terms")]
    pub max_terms: usize,

    /// Limit on programs per term (0 = unlimited)
    #[serde(rename = "max-programs")]
    pub max_programs: usize,

    #[serde(rename = "skip-minors")]
    pub skip_minors: bool,

    /// Elements scanned after an anchor on major pages
    #[serde(rename = "forward-scan-steps")]
    pub forward_scan_steps: usize,

    /// Elements scanned after an anchor on minor pages
    #[serde(rename = "minor-forward-scan-steps")]
    pub minor_forward_scan_steps: usize,

    /// Tables enumerated after an anchor by the last in-page strategy
    #[serde(rename = "table-scan-limit")]
    pub table_scan_limit: usize,

    /// Elements scanned after an anchor when looking for list links
    #[serde(rename = "link-scan-steps")]
    pub link_scan_steps: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            workers: 6,
            terms: Vec::new(),
            start_year: 2019,
            through_term: None,
            max_terms: 0,
            max_programs: 0,
            skip_minors: false,
            forward_scan_steps: 10,
            minor_forward_scan_steps: 40,
            table_scan_limit: 20,
            link_scan_steps: 15,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory of the per-term catalog files
    #[serde(rename = "courses-dir")]
    pub courses_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            courses_dir: "courses".to_string(),
        }
    }
}

fn default_programs() -> BTreeMap<String, String> {
    [
        ("BSBIO", "BIO"),
        ("BSCS", "CS"),
        ("BAECON", "ECON"),
        ("BSEE", "EE"),
        ("BSMS", "IE"),
        ("BSMAT", "MAT"),
        ("BSME", "ME"),
        ("BSDSA", "DSA"),
        ("BAMAN", "MAN"),
        ("BAPSIR", "PSIR"),
        ("BAPSY", "PSY"),
        ("BAVACD", "VACD"),
    ]
    .into_iter()
    .map(|(code, stem)| (code.to_string(), stem.to_string()))
    .collect()
}
