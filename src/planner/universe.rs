//! Universe extraction and caching
//!
//! The universe is every distinct product id seen in the configured event
//! categories, with the first url it appeared under. Extracting it means a
//! full scan of the behaviour collection, so the result is cached as a JSON
//! object and reused by later runs.

use crate::planner::rules::RuleSet;
use crate::source::{DocumentStore, SourceResult};
use crate::HarvestError;
use indexmap::IndexMap;
use std::fs;
use std::path::Path;

/// Product id → url, in discovery order
pub type Universe = IndexMap<String, String>;

/// Scans the document store and collects distinct products
///
/// The first url seen for an id wins; later documents for the same id
/// never overwrite it.
pub fn build_universe(
    store: &dyn DocumentStore,
    collections: &[String],
    rules: &RuleSet,
) -> SourceResult<Universe> {
    tracing::info!(
        "Extracting unique product ids for event collections: {:?}",
        collections
    );

    let documents = store.find_by_collections(collections)?;
    let mut universe = Universe::new();
    let mut skipped = 0usize;

    for doc in &documents {
        match rules.select(doc) {
            Some((id, url)) => {
                universe.entry(id).or_insert(url);
            }
            None => skipped += 1,
        }
    }

    tracing::info!(
        "Scanned {} documents: {} unique products, {} without id or url",
        documents.len(),
        universe.len(),
        skipped
    );
    Ok(universe)
}

/// Reads a cached universe, returning `None` if it is absent or unusable
pub fn load_cached_universe(path: &Path) -> Option<Universe> {
    if !path.exists() {
        return None;
    }

    let parsed = fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| {
            serde_json::from_str::<Universe>(&content).map_err(|e| e.to_string())
        });

    match parsed {
        Ok(universe) if !universe.is_empty() => {
            tracing::info!(
                "Loaded {} unique product ids from {}",
                universe.len(),
                path.display()
            );
            Some(universe)
        }
        Ok(_) => {
            tracing::warn!("Universe cache {} is empty, re-extracting", path.display());
            None
        }
        Err(e) => {
            tracing::error!(
                "Error loading universe cache {}: {}. Re-extracting from the document store.",
                path.display(),
                e
            );
            None
        }
    }
}

/// Writes the universe cache as a pretty-printed JSON object
pub fn save_universe_cache(path: &Path, universe: &Universe) -> Result<(), HarvestError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(universe)?;
    fs::write(path, content)?;
    Ok(())
}

/// Loads the universe from cache, or extracts and caches it
///
/// `open_store` is only called when the cache cannot be used, so a run over
/// a warm cache never touches the document store. A store that fails to
/// open, or an empty result, aborts the run.
///
/// # Arguments
///
/// * `cache_path` - Location of the JSON universe cache
/// * `refresh` - Ignore any existing cache
/// * `open_store` - Connects to the document store
/// * `collections` - Event categories to scan
/// * `rules` - Field selection per category
pub fn load_or_build_universe<F>(
    cache_path: &Path,
    refresh: bool,
    open_store: F,
    collections: &[String],
    rules: &RuleSet,
) -> Result<Universe, HarvestError>
where
    F: FnOnce() -> SourceResult<Box<dyn DocumentStore>>,
{
    if !refresh {
        if let Some(universe) = load_cached_universe(cache_path) {
            return Ok(universe);
        }
    }

    let store = open_store()?;
    let universe = build_universe(store.as_ref(), collections, rules)?;

    if universe.is_empty() {
        return Err(HarvestError::EmptyUniverse);
    }

    match save_universe_cache(cache_path, &universe) {
        Ok(()) => tracing::info!(
            "Saved {} unique product ids to {}",
            universe.len(),
            cache_path.display()
        ),
        Err(e) => tracing::error!(
            "Failed to write universe cache {}: {}",
            cache_path.display(),
            e
        ),
    }

    Ok(universe)
}
