use crate::config::types::{Config, CrawlerConfig, ExtractConfig, OutputConfig, SourceConfig, SourceKind};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_source_config(&config.source)?;
    validate_crawler_config(&config.crawler)?;
    validate_extract_config(&config.extract)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates document store configuration
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation(
            "source path cannot be empty".to_string(),
        ));
    }

    if config.kind == SourceKind::Sqlite {
        validate_identifier(&config.collection)?;
    }

    if config.event_collections.is_empty() {
        return Err(ConfigError::Validation(
            "event-collections must name at least one category".to_string(),
        ));
    }

    if let Some(blank) = config.event_collections.iter().find(|c| c.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "event-collections contains a blank entry: '{}'",
            blank
        )));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    if config.delay_min_ms > config.delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "delay-min-ms ({}) must not exceed delay-max-ms ({})",
            config.delay_min_ms, config.delay_max_ms
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.checkpoint_interval < 1 {
        return Err(ConfigError::Validation(
            "checkpoint-interval must be >= 1".to_string(),
        ));
    }

    if config.progress_interval < 1 {
        return Err(ConfigError::Validation(
            "progress-interval must be >= 1".to_string(),
        ));
    }

    if let Some(code) = config
        .throttle_status_codes
        .iter()
        .find(|c| !(100..=599).contains(*c))
    {
        return Err(ConfigError::Validation(format!(
            "throttle-status-codes contains an invalid HTTP status: {}",
            code
        )));
    }

    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;
    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            config.base_url
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates extraction configuration
fn validate_extract_config(config: &ExtractConfig) -> Result<(), ConfigError> {
    if config.fields.is_empty() {
        return Err(ConfigError::Validation(
            "extract must declare at least one field".to_string(),
        ));
    }

    for (i, field) in config.fields.iter().enumerate() {
        if field.name.is_empty() {
            return Err(ConfigError::Validation(format!(
                "extract field #{} has an empty name",
                i + 1
            )));
        }

        if field.name == "product_id" || field.name == "url" {
            return Err(ConfigError::Validation(format!(
                "extract field name '{}' collides with a fixed ledger column",
                field.name
            )));
        }

        if config.fields[..i].iter().any(|f| f.name == field.name) {
            return Err(ConfigError::Validation(format!(
                "extract field '{}' is declared twice",
                field.name
            )));
        }

        Selector::parse(&field.selector).map_err(|e| {
            ConfigError::InvalidSelector(format!("'{}' for field '{}': {}", field.selector, field.name, e))
        })?;
    }

    if !config.fields.iter().any(|f| f.name == config.primary) {
        return Err(ConfigError::Validation(format!(
            "primary field '{}' is not a declared extract field",
            config.primary
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, path) in [
        ("universe-cache-path", &config.universe_cache_path),
        ("processed-ids-path", &config.processed_ids_path),
        ("success-path", &config.success_path),
        ("failed-path", &config.failed_path),
    ] {
        if path.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    if config.success_path == config.failed_path {
        return Err(ConfigError::Validation(
            "success-path and failed-path must be different files".to_string(),
        ));
    }

    Ok(())
}

/// Validates a SQL table name (letters, digits, underscores; no leading digit)
fn validate_identifier(name: &str) -> Result<(), ConfigError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if !valid {
        return Err(ConfigError::Validation(format!(
            "collection '{}' is not a valid table name",
            name
        )));
    }

    Ok(())
}
