use serde::Deserialize;
use std::collections::HashMap;

/// Main configuration structure for Product-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which backend holds the behaviour documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// SQLite database with one row per behaviour event
    Sqlite,
    /// JSON-Lines export of the behaviour collection
    Jsonl,
}

/// How the product id and url are picked out of a behaviour document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldRule {
    /// `product_id` (falling back to `viewing_product_id`) and `current_url`
    ProductCurrent,
    /// `viewing_product_id` and `referrer_url`
    ViewingReferrer,
}

/// Document store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_kind")]
    pub kind: SourceKind,

    /// Path to the SQLite database or JSON-Lines file
    pub path: String,

    /// Table holding the behaviour summary (SQLite only)
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Event categories whose documents contribute products
    #[serde(rename = "event-collections")]
    pub event_collections: Vec<String>,

    /// Per-category overrides of the field selection rule
    #[serde(default = "default_rules")]
    pub rules: HashMap<String, FieldRule>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of pages fetched at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Lower bound of the politeness pause after each page (milliseconds)
    #[serde(default = "default_delay_min_ms")]
    pub delay_min_ms: u64,

    /// Upper bound of the politeness pause after each page (milliseconds)
    #[serde(default = "default_delay_max_ms")]
    pub delay_max_ms: u64,

    /// Back-off after a throttling response (milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Completed items between two checkpoints
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,

    /// Completed items between two progress lines
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    #[serde(default = "default_throttle_status_codes")]
    pub throttle_status_codes: Vec<u16>,

    /// Prefix for product urls stored without scheme and host
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Page data extraction configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractConfig {
    /// Field that must be non-empty for a page to count as a success
    #[serde(default = "default_primary_field")]
    pub primary: String,

    /// Declared attributes, in success ledger column order
    #[serde(default = "default_fields")]
    pub fields: Vec<FieldSelector>,
}

/// One extracted attribute
#[derive(Debug, Clone, Deserialize)]
pub struct FieldSelector {
    pub name: String,

    /// CSS selector; the text of the first match is the value
    pub selector: String,

    /// Read this attribute of the matched element instead of its text
    #[serde(default)]
    pub attribute: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// JSON object of product id to url, extracted once
    pub universe_cache_path: String,

    /// JSON array of product ids already crawled
    pub processed_ids_path: String,

    /// CSV of successfully extracted products
    pub success_path: String,

    /// Append-only CSV of failed products
    pub failed_path: String,
}

/// Optional log files in addition to the console
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingConfig {
    pub log_file: Option<String>,
    pub error_log_file: Option<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            delay_min_ms: default_delay_min_ms(),
            delay_max_ms: default_delay_max_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            checkpoint_interval: default_checkpoint_interval(),
            progress_interval: default_progress_interval(),
            throttle_status_codes: default_throttle_status_codes(),
            base_url: default_base_url(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            primary: default_primary_field(),
            fields: default_fields(),
        }
    }
}

impl ExtractConfig {
    /// Names of the declared attributes, in column order
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

fn default_source_kind() -> SourceKind {
    SourceKind::Sqlite
}

fn default_collection() -> String {
    "summary".to_string()
}

fn default_rules() -> HashMap<String, FieldRule> {
    HashMap::from([(
        "product_view_all_recommend_clicked".to_string(),
        FieldRule::ViewingReferrer,
    )])
}

fn default_concurrency() -> u32 {
    5
}

fn default_delay_min_ms() -> u64 {
    1000
}

fn default_delay_max_ms() -> u64 {
    3000
}

fn default_retry_delay_ms() -> u64 {
    10_000
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_checkpoint_interval() -> u64 {
    100
}

fn default_progress_interval() -> u64 {
    50
}

fn default_throttle_status_codes() -> Vec<u16> {
    vec![429, 503, 504]
}

fn default_base_url() -> String {
    "https://www.glamira.vn/".to_string()
}

fn default_user_agent() -> String {
    format!("product-harvest/{}", env!("CARGO_PKG_VERSION"))
}

fn default_primary_field() -> String {
    "product_name".to_string()
}

fn default_fields() -> Vec<FieldSelector> {
    vec![FieldSelector {
        name: "product_name".to_string(),
        selector: "h1.page-title".to_string(),
        attribute: None,
    }]
}
