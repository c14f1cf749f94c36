//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and timeouts
//! - A process-wide counting semaphore bounding requests in flight
//! - One persistent client (cookies, keep-alive) per worker, checked out as a `Session`
//! - Retry with exponential backoff and jitter
//! - An optional politeness pause after each successful request

use reqwest::Client;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::HttpConfig;
use crate::HarvestError;

/// Upper bound of the random jitter added to every backoff (seconds)
const MAX_JITTER_SECS: f64 = 0.25;

/// One page to retrieve: a URL plus an optional form payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTarget {
    pub url: String,

    /// Form fields; when present the request is a form-encoded POST
    pub form: Option<Vec<(String, String)>>,
}

impl FetchTarget {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            form: None,
        }
    }

    pub fn post_form(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            url: url.into(),
            form: Some(form),
        }
    }
}

/// Fetch layer settings
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,

    /// Additional attempts after the first failure
    pub retries: u32,

    pub backoff_base: Duration,

    /// Capacity of the in-flight semaphore
    pub max_in_flight: usize,

    /// Pause after every successful fetch
    pub politeness_delay: Duration,

    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&HttpConfig::default())
    }
}

impl From<&HttpConfig> for FetchConfig {
    fn from(config: &HttpConfig) -> Self {
        Self {
            timeout: config.timeout(),
            retries: config.retries,
            backoff_base: config.backoff_base(),
            max_in_flight: config.max_in_flight.max(1),
            politeness_delay: config.politeness_delay(),
            user_agent: config.user_agent.clone(),
        }
    }
}

/// Backoff before retry number `attempt` (0-based), without jitter
///
/// Equals `base * 2^attempt`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

fn jitter() -> Duration {
    Duration::from_secs_f64(rand::random_range(0.0..MAX_JITTER_SECS))
}

/// Counters describing fetch activity
#[derive(Debug, Default)]
pub struct FetchStats {
    requests: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FetchStats {
    /// Requests sent, including retries
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Fetches that failed after exhausting every retry
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous requests observed
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

/// Tracks one request while it holds a semaphore permit
struct InFlight<'a> {
    stats: &'a FetchStats,
}

impl<'a> InFlight<'a> {
    fn enter(stats: &'a FetchStats) -> Self {
        stats.requests.fetch_add(1, Ordering::Relaxed);
        let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        stats.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self { stats }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Builds an HTTP client with proper configuration
///
/// Cookies are kept per client, so each worker's session sees its own
/// cookie jar.
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout)
        .connect_timeout(config.timeout.min(Duration::from_secs(10)))
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Shared fetch layer: the in-flight gate plus the pool of worker clients
#[derive(Debug)]
pub struct Fetcher {
    config: FetchConfig,
    gate: Semaphore,
    idle: Mutex<HashMap<usize, Client>>,
    stats: FetchStats,
}

impl Fetcher {
    /// Creates the fetch layer
    ///
    /// A first client is built eagerly so configuration problems surface
    /// here rather than inside a worker.
    pub fn new(config: FetchConfig) -> Result<Arc<Self>, HarvestError> {
        let client = build_http_client(&config)?;
        let mut idle = HashMap::new();
        idle.insert(0, client);

        Ok(Arc::new(Self {
            gate: Semaphore::new(config.max_in_flight.max(1)),
            config,
            idle: Mutex::new(idle),
            stats: FetchStats::default(),
        }))
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn stats(&self) -> &FetchStats {
        &self.stats
    }

    /// Checks out the persistent client of `worker`
    ///
    /// The client is created on first use and returned to the pool when the
    /// session is dropped, so a worker keeps its cookies and connections
    /// across batches.
    pub fn session(self: &Arc<Self>, worker: usize) -> Result<Session, HarvestError> {
        let cached = self
            .idle
            .lock()
            .ok()
            .and_then(|mut idle| idle.remove(&worker));

        let client = match cached {
            Some(client) => client,
            None => {
                tracing::trace!(worker, "Building HTTP client for worker");
                build_http_client(&self.config)?
            }
        };

        Ok(Session {
            worker,
            client,
            fetcher: Arc::clone(self),
        })
    }

    fn release(&self, worker: usize, client: Client) {
        if let Ok(mut idle) = self.idle.lock() {
            idle.insert(worker, client);
        }
    }
}

/// A worker's scoped handle on its persistent client
pub struct Session {
    worker: usize,
    client: Client,
    fetcher: Arc<Fetcher>,
}

impl Session {
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Fetches a target and returns the response body
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Transport error | Retry |
    /// | Non-2xx status | Retry |
    /// | Retries exhausted | `HarvestError::Network` |
    ///
    /// The pause before retry `n` is `backoff_base * 2^n` plus up to 250ms
    /// of jitter. Only this worker sleeps; the in-flight permit is released
    /// before sleeping.
    pub async fn fetch(&self, target: &FetchTarget) -> Result<String, HarvestError> {
        let config = &self.fetcher.config;
        let attempts = config.retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            match self.attempt(target).await {
                Ok(body) => {
                    if !config.politeness_delay.is_zero() {
                        tokio::time::sleep(config.politeness_delay).await;
                    }
                    return Ok(body);
                }
                Err(cause) => {
                    if attempt + 1 >= attempts {
                        self.fetcher.stats.failures.fetch_add(1, Ordering::Relaxed);
                        return Err(HarvestError::Network {
                            url: target.url.clone(),
                            cause,
                        });
                    }

                    let delay = backoff_delay(config.backoff_base, attempt) + jitter();
                    tracing::warn!(
                        worker = self.worker,
                        "Fetch of {} failed (attempt {}/{}): {}; retrying in {:?}",
                        target.url,
                        attempt + 1,
                        attempts,
                        cause,
                        delay
                    );
                    self.fetcher.stats.retries.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One request under an in-flight permit, body included
    async fn attempt(&self, target: &FetchTarget) -> Result<String, String> {
        let _permit = self
            .fetcher
            .gate
            .acquire()
            .await
            .map_err(|e| e.to_string())?;
        let _in_flight = InFlight::enter(&self.fetcher.stats);

        let request = match &target.form {
            Some(form) => self.client.post(&target.url).form(form),
            None => self.client.get(&target.url),
        };

        let response = request.send().await.map_err(describe)?;
        let response = response.error_for_status().map_err(describe)?;
        response.text().await.map_err(describe)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.fetcher.release(self.worker, self.client.clone());
    }
}

fn describe(error: reqwest::Error) -> String {
    if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else if let Some(status) = error.status() {
        format!("HTTP {}", status)
    } else {
        error.to_string()
    }
}
