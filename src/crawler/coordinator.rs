//! Crawl coordinator - batch orchestration
//!
//! This module turns the configuration into work units and runs them:
//! - Resolving terms and the program listings into (program, term) units
//! - Fanning units out to a fixed pool of workers, each with its own session
//! - Collecting results keyed by unit so output order never depends on
//!   completion order
//! - Writing successful units and the per-term manifests through a sink

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;

use crate::catalog::{AnchorScheme, Classification};
use crate::config::Config;
use crate::crawler::fetcher::{FetchConfig, FetchTarget, Fetcher};
use crate::crawler::locator::LocatorLimits;
use crate::crawler::program::{crawl, CrawlResult, PageProfile, ProgramKind, WorkUnit};
use crate::output::{BatchReport, Manifest, RecordSink};
use crate::portal::{parse_program_listing, Portal};
use crate::terms::{generate_terms, today_at_portal};
use crate::HarvestError;

type Queue = Arc<Mutex<VecDeque<(WorkUnit, FetchTarget)>>>;

/// Results of one batch, keyed and therefore sorted by unit
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub results: BTreeMap<WorkUnit, CrawlResult>,
}

impl BatchOutcome {
    /// Term → sorted labels of the units that succeeded in that term
    pub fn manifest(&self) -> Manifest {
        let mut by_term: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (unit, result) in &self.results {
            if result.is_ok() {
                by_term
                    .entry(unit.term.clone())
                    .or_default()
                    .insert(unit.label.clone());
            }
        }
        by_term
            .into_iter()
            .map(|(term, labels)| (term, labels.into_iter().collect()))
            .collect()
    }

    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|r| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// Records a failure for every unit that has no result yet
    ///
    /// Returns how many units were marked.
    pub fn fail_missing(&mut self, units: &[WorkUnit], cause: &str) -> usize {
        let mut marked = 0;
        for unit in units {
            if !self.results.contains_key(unit) {
                self.results
                    .insert(unit.clone(), Err(HarvestError::Worker(cause.to_string())));
                marked += 1;
            }
        }
        marked
    }

    /// Writes every successful unit in order and reports on all of them
    ///
    /// A write failure is returned immediately; crawl failures only appear
    /// in the report.
    pub fn write_to<S: RecordSink + ?Sized>(&self, sink: &S) -> Result<BatchReport, HarvestError> {
        let mut report = BatchReport::new();
        for (unit, result) in &self.results {
            match result {
                Ok(records) => {
                    sink.write_unit(unit, records)?;
                    report.succeeded.push((unit.clone(), records.len()));
                }
                Err(e) => report.failed.push((unit.clone(), e.to_string())),
            }
        }
        Ok(report)
    }
}

/// Main coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    fetcher: Arc<Fetcher>,
    classification: Arc<Classification>,
    portal: Portal,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated harvest configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - The HTTP client or portal URL could not be set up
    pub fn new(config: Config) -> Result<Self, HarvestError> {
        let fetcher = Fetcher::new(FetchConfig::from(&config.http))?;
        let classification = Classification::with_faculty_courses(&config.faculty_courses);
        let portal = Portal::new(&config.portal)?;

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            classification: Arc::new(classification),
            portal,
        })
    }

    pub fn fetcher(&self) -> &Arc<Fetcher> {
        &self.fetcher
    }

    pub fn portal(&self) -> &Portal {
        &self.portal
    }

    /// How pages of a program kind are read
    pub fn profile(&self, kind: ProgramKind) -> PageProfile {
        let crawl = &self.config.crawl;
        let (forward_steps, anchors) = match kind {
            ProgramKind::Major => (crawl.forward_scan_steps, AnchorScheme::Major),
            ProgramKind::Minor => (crawl.minor_forward_scan_steps, AnchorScheme::Minor),
        };
        PageProfile {
            limits: LocatorLimits {
                forward_steps,
                table_scan_limit: crawl.table_scan_limit,
                link_scan_steps: crawl.link_scan_steps,
            },
            anchors,
            apply_overrides: kind == ProgramKind::Major,
            list_marker: self.config.portal.list_marker.clone(),
        }
    }

    /// Terms to crawl: the explicit list, or every term since the start year
    pub fn resolve_terms(&self) -> Result<Vec<String>, HarvestError> {
        let crawl = &self.config.crawl;
        let mut terms = if crawl.terms.is_empty() {
            generate_terms(
                crawl.start_year,
                crawl.through_term.as_deref(),
                today_at_portal(),
            )?
        } else {
            crawl.terms.clone()
        };

        if crawl.max_terms > 0 {
            terms.truncate(crawl.max_terms);
        }
        Ok(terms)
    }

    /// Major units: configured programs that the portal lists, for every term
    ///
    /// This is the only step whose failure aborts the harvest.
    pub async fn resolve_major_units(&self, terms: &[String]) -> Result<Vec<WorkUnit>, HarvestError> {
        let listed = self
            .fetch_listing(ProgramKind::Major)
            .await
            .map_err(|e| HarvestError::Listing(format!("majors listing: {}", e)))?;
        if listed.is_empty() {
            return Err(HarvestError::Listing(
                "majors listing contains no programs".to_string(),
            ));
        }

        let mut programs: Vec<(&String, &String)> = self
            .config
            .programs
            .iter()
            .filter(|(code, _)| listed.contains(*code))
            .collect();
        for code in self.config.programs.keys().filter(|c| !listed.contains(*c)) {
            tracing::warn!("Program {} is not listed by the portal, skipping", code);
        }
        if self.config.crawl.max_programs > 0 {
            programs.truncate(self.config.crawl.max_programs);
        }

        Ok(terms
            .iter()
            .flat_map(|term| {
                programs
                    .iter()
                    .map(move |(code, stem)| WorkUnit::major(code.as_str(), term.as_str(), stem.as_str()))
            })
            .collect())
    }

    /// Minor units for every term; a listing failure only skips minors
    pub async fn resolve_minor_units(&self, terms: &[String]) -> Vec<WorkUnit> {
        let listed = match self.fetch_listing(ProgramKind::Minor).await {
            Ok(listed) => listed,
            Err(e) => {
                tracing::warn!("Minors listing unavailable, skipping minors: {}", e);
                return Vec::new();
            }
        };

        terms
            .iter()
            .flat_map(|term| {
                listed
                    .iter()
                    .map(move |code| WorkUnit::minor(code.as_str(), term.as_str()))
            })
            .collect()
    }

    async fn fetch_listing(&self, kind: ProgramKind) -> Result<BTreeSet<String>, HarvestError> {
        let target = self.portal.program_list(kind)?;
        let session = self.fetcher.session(0)?;
        let body = session.fetch(&target).await?;
        Ok(parse_program_listing(&body)
            .into_iter()
            .map(|entry| entry.code)
            .collect())
    }

    /// Crawls a batch of units on the worker pool
    ///
    /// Each worker owns one session for the whole batch and pulls units
    /// from a shared queue until it is empty. A failing unit never stops its
    /// worker or its siblings.
    pub async fn run_batch(&self, units: Vec<WorkUnit>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut queue = VecDeque::with_capacity(units.len());

        for unit in units {
            match self.portal.degree_detail(&unit.program, &unit.term) {
                Ok(target) => queue.push_back((unit, target)),
                Err(e) => {
                    outcome.results.insert(unit, Err(e));
                }
            }
        }

        let submitted: Vec<WorkUnit> = queue.iter().map(|(unit, _)| unit.clone()).collect();
        let workers = self.config.crawl.workers.max(1).min(queue.len());
        let queue: Queue = Arc::new(Mutex::new(queue));
        let mut tasks = JoinSet::new();

        for worker in 0..workers {
            let queue = Arc::clone(&queue);
            let fetcher = Arc::clone(&self.fetcher);
            let classification = Arc::clone(&self.classification);
            let major = self.profile(ProgramKind::Major);
            let minor = self.profile(ProgramKind::Minor);

            tasks.spawn(async move {
                let mut results = Vec::new();
                let session = match fetcher.session(worker) {
                    Ok(session) => session,
                    Err(e) => {
                        tracing::error!(worker, "Worker could not start: {}", e);
                        while let Some((unit, _)) = next_unit(&queue) {
                            results.push((unit, Err(HarvestError::Worker(e.to_string()))));
                        }
                        return results;
                    }
                };

                while let Some((unit, target)) = next_unit(&queue) {
                    let profile = match unit.kind {
                        ProgramKind::Major => &major,
                        ProgramKind::Minor => &minor,
                    };
                    let result = crawl(&session, &target, profile, &classification).await;
                    match &result {
                        Ok(records) => {
                            tracing::info!(worker, "Crawled {} with {} records", unit, records.len())
                        }
                        Err(e) => tracing::warn!(worker, "Failed {}: {}", unit, e),
                    }
                    results.push((unit, result));
                }
                results
            });
        }

        let mut lost = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(results) => outcome.results.extend(results),
                Err(e) => {
                    tracing::error!("Worker task failed: {}", e);
                    lost = Some(e.to_string());
                }
            }
        }

        if let Some(cause) = lost {
            let marked = outcome.fail_missing(&submitted, &cause);
            tracing::warn!("Marked {} unit(s) without a result as failed", marked);
        }

        outcome
    }

    /// Runs the whole harvest: majors, then minors unless skipped
    pub async fn run<S: RecordSink + ?Sized>(&self, sink: &S) -> Result<BatchReport, HarvestError> {
        let terms = self.resolve_terms()?;
        tracing::info!("Harvesting {} term(s)", terms.len());

        let majors = self.resolve_major_units(&terms).await?;
        tracing::info!("Crawling {} major catalog(s)", majors.len());
        let outcome = self.run_batch(majors).await;
        let mut report = outcome.write_to(sink)?;
        sink.write_manifest(ProgramKind::Major, &outcome.manifest())?;
        tracing::info!(
            "Majors done: {} succeeded, {} failed",
            outcome.succeeded(),
            outcome.failed()
        );

        if self.config.crawl.skip_minors {
            tracing::info!("Skipping minors");
        } else {
            let minors = self.resolve_minor_units(&terms).await;
            if !minors.is_empty() {
                tracing::info!("Crawling {} minor catalog(s)", minors.len());
                let outcome = self.run_batch(minors).await;
                report.merge(outcome.write_to(sink)?);
                sink.write_manifest(ProgramKind::Minor, &outcome.manifest())?;
                tracing::info!(
                    "Minors done: {} succeeded, {} failed",
                    outcome.succeeded(),
                    outcome.failed()
                );
            }
        }

        Ok(report.with_fetch_stats(self.fetcher.stats()))
    }
}

fn next_unit(queue: &Queue) -> Option<(WorkUnit, FetchTarget)> {
    queue.lock().ok().and_then(|mut queue| queue.pop_front())
}

/// Runs a complete harvest with the given configuration and sink
pub async fn run_harvest<S: RecordSink + ?Sized>(
    config: Config,
    sink: &S,
) -> Result<BatchReport, HarvestError> {
    let coordinator = Coordinator::new(config)?;
    coordinator.run(sink).await
}
