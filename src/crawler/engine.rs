//! Concurrent crawl engine
//!
//! Each work item is an independent unit: fetch, extract, record the
//! outcome, back off on throttling, pause, and give the ledger a chance to
//! checkpoint. Units run on a bounded task pool; the ledger is the only
//! state they share.

use crate::config::{Config, CrawlerConfig};
use crate::crawler::extractor::Extractor;
use crate::crawler::fetcher::{build_http_client, fetch_url, FetchResult};
use crate::crawler::pool::TaskPool;
use crate::ledger::{CheckpointLedger, FailureRecord, SuccessRecord};
use crate::planner::WorkItem;
use crate::HarvestError;
use futures::FutureExt;
use rand::Rng;
use reqwest::Client;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Scheduling and pacing knobs
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub concurrency: usize,
    pub delay_min: Duration,
    pub delay_max: Duration,
    pub retry_delay: Duration,
    pub throttle_status_codes: Vec<u16>,
    pub progress_interval: u64,
}

impl From<&CrawlerConfig> for EngineSettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            concurrency: config.concurrency as usize,
            delay_min: Duration::from_millis(config.delay_min_ms),
            delay_max: Duration::from_millis(config.delay_max_ms),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            throttle_status_codes: config.throttle_status_codes.clone(),
            progress_interval: config.progress_interval.max(1),
        }
    }
}

/// Instrumentation collected over one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Units that finished, however they ended
    pub completed: u64,
    /// Units that slept after a throttling response
    pub throttle_backoffs: u64,
    /// Sum of the back-off sleeps requested
    pub backoff_time: Duration,
    /// Units whose item procedure panicked
    pub panics: u64,
    /// Units whose task could not be joined
    pub join_errors: u64,
}

/// What a run produced
#[derive(Debug)]
pub struct CrawlOutcome {
    pub successes: Vec<SuccessRecord>,
    pub failures: Vec<FailureRecord>,
    pub stats: EngineStats,
}

/// Per-unit report handed back to the dispatcher
#[derive(Debug, Default)]
struct UnitReport {
    backoff: Option<Duration>,
    panicked: bool,
}

/// Fetches and extracts product pages on a bounded pool
#[derive(Clone)]
pub struct CrawlEngine {
    client: Client,
    extractor: Arc<Extractor>,
    base_url: Url,
    settings: EngineSettings,
}

impl CrawlEngine {
    pub fn new(client: Client, extractor: Extractor, base_url: Url, settings: EngineSettings) -> Self {
        Self {
            client,
            extractor: Arc::new(extractor),
            base_url,
            settings,
        }
    }

    /// Builds the client, selectors and settings from configuration
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        let client = build_http_client(&config.crawler)?;
        let extractor = Extractor::new(&config.extract)?;
        let base_url = Url::parse(&config.crawler.base_url)?;
        Ok(Self::new(
            client,
            extractor,
            base_url,
            EngineSettings::from(&config.crawler),
        ))
    }

    /// Crawls every item and waits for all of them
    ///
    /// Every item ends with exactly one outcome in the ledger. A final forced
    /// checkpoint runs once all units are done.
    ///
    /// # Arguments
    ///
    /// * `work_list` - Items not yet processed
    /// * `ledger` - Shared outcome ledger
    ///
    /// # Returns
    ///
    /// Successes and failures recorded during this run, with instrumentation
    pub async fn run(&self, work_list: Vec<WorkItem>, ledger: Arc<CheckpointLedger>) -> CrawlOutcome {
        let total = work_list.len() as u64;
        let start_time = Instant::now();
        tracing::info!(
            "Starting crawl with {} workers for {} URLs",
            self.settings.concurrency,
            total
        );

        let mut pool = TaskPool::new(self.settings.concurrency);
        for item in work_list {
            let engine = self.clone();
            let ledger = Arc::clone(&ledger);
            pool.submit(async move { engine.run_unit(item, ledger).await });
        }

        let mut stats = EngineStats::default();
        let progress_interval = self.settings.progress_interval;
        pool.await_all(|result| {
            stats.completed += 1;
            match result {
                Ok(report) => {
                    if let Some(backoff) = report.backoff {
                        stats.throttle_backoffs += 1;
                        stats.backoff_time += backoff;
                    }
                    if report.panicked {
                        stats.panics += 1;
                    }
                }
                Err(e) => {
                    stats.join_errors += 1;
                    tracing::error!("Task execution error: {}", e);
                }
            }

            if stats.completed % progress_interval == 0 {
                tracing::info!(
                    "Progress: {}/{} URLs completed ({:.1}%)",
                    stats.completed,
                    total,
                    stats.completed as f64 / total as f64 * 100.0
                );
            }
        })
        .await;

        ledger.flush_final();

        let counters = ledger.counters();
        tracing::info!(
            "Crawl completed in {:?}: {} processed, {} successful, {} failed",
            start_time.elapsed(),
            counters.processed,
            counters.succeeded,
            counters.failed
        );
        if stats.throttle_backoffs > 0 {
            tracing::info!(
                "Backed off {} times after throttling ({:?} total)",
                stats.throttle_backoffs,
                stats.backoff_time
            );
        }

        let (successes, failures) = ledger.outcomes();
        CrawlOutcome {
            successes,
            failures,
            stats,
        }
    }

    /// One unit of work, from fetch to checkpoint check
    async fn run_unit(&self, item: WorkItem, ledger: Arc<CheckpointLedger>) -> UnitReport {
        let outcome = guard_unit(&item, &ledger, self.process_item(&item, &ledger)).await;

        let mut report = UnitReport {
            panicked: outcome.is_none(),
            ..UnitReport::default()
        };

        if let Some(Some(status_code)) = outcome {
            let backoff = self.settings.retry_delay;
            tracing::warn!(
                "Throttled with HTTP {} on product {}, backing off for {:?}",
                status_code,
                item.id,
                backoff
            );
            tokio::time::sleep(backoff).await;
            report.backoff = Some(backoff);
        }

        let pause = politeness_delay(self.settings.delay_min, self.settings.delay_max);
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        ledger.maybe_checkpoint(false);
        report
    }

    /// Fetches and extracts one item and records its outcome
    ///
    /// Returns the status code when the server answered with a throttling
    /// status.
    async fn process_item(&self, item: &WorkItem, ledger: &CheckpointLedger) -> Option<u16> {
        let url = match item.target_url(&self.base_url) {
            Ok(url) => url,
            Err(e) => {
                ledger.record_failure(
                    &item.id,
                    &item.url,
                    &format!("Invalid URL for product_id '{}': {}", item.id, e),
                );
                return None;
            }
        };
        let url = url.as_str();

        match fetch_url(&self.client, url).await {
            FetchResult::Success { body, .. } => match self.extractor.extract(&body) {
                Some(fields) => {
                    tracing::debug!("Extracted product {} from {}", item.id, url);
                    ledger.record_success(&item.id, fields, url);
                    None
                }
                None => {
                    ledger.record_failure(
                        &item.id,
                        url,
                        &format!(
                            "{} not found for product_id '{}' on URL: {}",
                            display_name(self.extractor.primary()),
                            item.id,
                            url
                        ),
                    );
                    None
                }
            },
            FetchResult::HttpError {
                status_code,
                reason,
            } => {
                ledger.record_failure(
                    &item.id,
                    url,
                    &format!(
                        "HTTP error for product_id '{}' at URL '{}': {} {}",
                        item.id, url, status_code, reason
                    ),
                );
                self.settings
                    .throttle_status_codes
                    .contains(&status_code)
                    .then_some(status_code)
            }
            FetchResult::NetworkError { error } => {
                ledger.record_failure(
                    &item.id,
                    url,
                    &format!(
                        "Could not connect to product_id '{}' at URL '{}': {}",
                        item.id, url, error
                    ),
                );
                None
            }
        }
    }
}

/// Runs an item procedure, turning a panic into a recorded failure
///
/// Returns `None` if the procedure panicked.
async fn guard_unit<F, T>(item: &WorkItem, ledger: &CheckpointLedger, procedure: F) -> Option<T>
where
    F: Future<Output = T>,
{
    match AssertUnwindSafe(procedure).catch_unwind().await {
        Ok(value) => Some(value),
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(
                "Unexpected error while processing product {}: {}",
                item.id,
                message
            );
            ledger.record_failure(
                &item.id,
                &item.url,
                &format!(
                    "An unexpected error occurred while processing product_id '{}' at URL '{}': {}",
                    item.id, item.url, message
                ),
            );
            None
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// `product_name` -> `Product name`
fn display_name(field: &str) -> String {
    let spaced = field.replace(['_', '-'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => spaced,
    }
}

/// Uniformly random pause in `[min, max]`
fn politeness_delay(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let millis = rand::thread_rng().gen_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(millis)
}
