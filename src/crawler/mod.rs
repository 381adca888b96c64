//! Crawler module
//!
//! This module contains the crawling side of a harvest:
//! - HTTP fetching and product page extraction
//! - The bounded task pool and the concurrent crawl engine
//! - Run orchestration

mod coordinator;
mod engine;
mod extractor;
mod fetcher;
mod pool;

pub use coordinator::{plan_harvest, run_harvest, Coordinator, HarvestOptions, HarvestPlan};
pub use engine::{CrawlEngine, CrawlOutcome, EngineSettings, EngineStats};
pub use extractor::Extractor;
pub use fetcher::{build_http_client, fetch_url, FetchResult};
pub use pool::TaskPool;
