//! Harvest coordinator - run orchestration
//!
//! This module wires the pieces of a run together:
//! - Clearing resumption state for a fresh run
//! - Loading or extracting the product universe
//! - Loading the checkpoint ledger and resolving the work list
//! - Driving the crawl engine
//! - Summarising the outcome

use crate::config::Config;
use crate::crawler::CrawlEngine;
use crate::ledger::files::read_processed_ids;
use crate::ledger::{CheckpointLedger, CheckpointPaths};
use crate::planner::{
    build_universe, load_cached_universe, load_or_build_universe, resolve_work_list, RuleSet,
    WorkItem,
};
use crate::report::RunSummary;
use crate::source::open_source;
use crate::HarvestError;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Run-level switches from the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct HarvestOptions {
    /// Delete processed ids and both ledgers before starting
    pub fresh: bool,
    /// Ignore the universe cache and re-extract from the document store
    pub refresh_universe: bool,
}

/// Main harvest coordinator structure
pub struct Coordinator {
    config: Config,
    universe_size: usize,
    work_list: Vec<WorkItem>,
    ledger: Arc<CheckpointLedger>,
}

impl Coordinator {
    /// Plans a run
    ///
    /// # Arguments
    ///
    /// * `config` - The harvest configuration
    /// * `options` - Fresh start and universe refresh switches
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to crawl the resolved work list
    /// * `Err(HarvestError)` - The store could not be reached, the universe
    ///   is empty, or the ledger could not be prepared
    pub fn new(config: Config, options: HarvestOptions) -> Result<Self, HarvestError> {
        let paths = CheckpointPaths::from(&config.output);

        if options.fresh {
            tracing::info!("Fresh run requested, clearing resumption state");
            for path in [&paths.processed_ids, &paths.success, &paths.failure] {
                remove_if_exists(path)?;
            }
        }

        let rules = RuleSet::new(config.source.rules.clone());
        let universe = load_or_build_universe(
            Path::new(&config.output.universe_cache_path),
            options.refresh_universe,
            || open_source(&config.source),
            &config.source.event_collections,
            &rules,
        )?;
        tracing::info!("Universe holds {} unique products", universe.len());

        let ledger = CheckpointLedger::load(
            paths,
            config.extract.field_names(),
            config.crawler.checkpoint_interval,
        )?;

        let work_list = resolve_work_list(&universe, &ledger.processed_ids());
        tracing::info!(
            "{} products already processed, {} left to crawl",
            universe.len() - work_list.len(),
            work_list.len()
        );

        Ok(Self {
            config,
            universe_size: universe.len(),
            work_list,
            ledger: Arc::new(ledger),
        })
    }

    pub fn universe_size(&self) -> usize {
        self.universe_size
    }

    /// Items this run will crawl
    pub fn work_list(&self) -> &[WorkItem] {
        &self.work_list
    }

    pub fn ledger(&self) -> &CheckpointLedger {
        &self.ledger
    }

    /// Crawls the work list and summarises the run
    pub async fn run(self) -> Result<RunSummary, HarvestError> {
        if self.work_list.is_empty() {
            tracing::info!("All products have already been processed");
        }

        let engine = CrawlEngine::from_config(&self.config)?;
        let outcome = engine.run(self.work_list, Arc::clone(&self.ledger)).await;

        Ok(RunSummary::collect(
            self.universe_size,
            &outcome.successes,
            &outcome.failures,
            &self.ledger.paths().failure,
        ))
    }
}

/// What a run would crawl
#[derive(Debug, Clone)]
pub struct HarvestPlan {
    pub universe_size: usize,
    pub work_list: Vec<WorkItem>,
}

/// Plans a run without writing anything to disk
///
/// Unlike [`Coordinator::new`], neither the universe cache nor the failure
/// ledger is created. The same store and empty-universe errors apply.
pub fn plan_harvest(config: &Config, options: HarvestOptions) -> Result<HarvestPlan, HarvestError> {
    let cached = if options.refresh_universe {
        None
    } else {
        load_cached_universe(Path::new(&config.output.universe_cache_path))
    };

    let universe = match cached {
        Some(universe) => universe,
        None => {
            let store = open_source(&config.source)?;
            let rules = RuleSet::new(config.source.rules.clone());
            build_universe(store.as_ref(), &config.source.event_collections, &rules)?
        }
    };
    if universe.is_empty() {
        return Err(HarvestError::EmptyUniverse);
    }

    let processed = if options.fresh {
        HashSet::new()
    } else {
        read_processed_ids(Path::new(&config.output.processed_ids_path)).unwrap_or_else(|e| {
            tracing::warn!("Cannot read processed ids, assuming none: {}", e);
            HashSet::new()
        })
    };

    Ok(HarvestPlan {
        universe_size: universe.len(),
        work_list: resolve_work_list(&universe, &processed),
    })
}

fn remove_if_exists(path: &Path) -> Result<(), HarvestError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Runs a whole harvest: plan, crawl, summarise
///
/// # Example
///
/// ```no_run
/// use product_harvest::config::load_config;
/// use product_harvest::crawler::{run_harvest, HarvestOptions};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// let summary = run_harvest(config, HarvestOptions::default()).await?;
/// println!("{} failed", summary.failed);
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest(config: Config, options: HarvestOptions) -> Result<RunSummary, HarvestError> {
    Coordinator::new(config, options)?.run().await
}
