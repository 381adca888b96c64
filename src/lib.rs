//! Product-Harvest: a resumable product page crawler
//!
//! This crate enriches user-behaviour records with product names and
//! attributes scraped from the shop's product pages. Work is planned from a
//! document store, crawled by a bounded pool of concurrent tasks, and
//! checkpointed to disk so an interrupted run picks up where it left off.

pub mod config;
pub mod crawler;
pub mod ledger;
pub mod planner;
pub mod report;
pub mod source;

use thiserror::Error;

/// Main error type for Product-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Document store error: {0}")]
    Source(#[from] source::SourceError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger::LedgerError),

    #[error("No products found for the configured event collections")]
    EmptyUniverse,

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
}

/// Result type alias for Product-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlEngine, CrawlOutcome};
pub use ledger::{CheckpointCounters, CheckpointLedger};
pub use planner::{Universe, WorkItem};
pub use report::RunSummary;
