//! Work planning
//!
//! This module derives what a run has to crawl:
//! - Extracting (or loading the cached) product universe
//! - Per-category selection of the id and url fields
//! - Subtracting products already processed by earlier runs

mod rules;
mod universe;

pub use rules::RuleSet;
pub use universe::{
    build_universe, load_cached_universe, load_or_build_universe, save_universe_cache, Universe,
};

use std::collections::HashSet;
use url::Url;

/// One product to crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: String,

    /// Url as recorded in the behaviour data; may lack scheme and host
    pub url: String,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }

    /// Absolute url to fetch
    ///
    /// Urls stored without a scheme are taken relative to the shop root,
    /// ignoring any leading slashes.
    pub fn target_url(&self, base: &Url) -> Result<Url, url::ParseError> {
        match Url::parse(&self.url) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                base.join(self.url.trim_start_matches('/'))
            }
            Err(e) => Err(e),
        }
    }
}

/// Products in the universe that have not been processed yet
///
/// Order follows the universe's insertion order.
pub fn resolve_work_list(universe: &Universe, processed: &HashSet<String>) -> Vec<WorkItem> {
    universe
        .iter()
        .filter(|(id, _)| !processed.contains(id.as_str()))
        .map(|(id, url)| WorkItem::new(id.as_str(), url.as_str()))
        .collect()
}
