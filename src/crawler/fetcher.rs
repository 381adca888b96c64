//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the shared HTTP client with the configured timeout
//! - GET requests for product pages
//! - Error classification into HTTP and transport failures

use crate::config::CrawlerConfig;
use reqwest::Client;
use std::time::Duration;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the page
    Success {
        /// HTTP status code
        status_code: u16,
        /// Page body content
        body: String,
    },

    /// The server answered with a non-success status
    HttpError {
        /// The HTTP status code
        status_code: u16,
        /// Canonical reason phrase, if known
        reason: String,
    },

    /// Network error (connection refused, timeout, body read failure, etc.)
    NetworkError {
        /// Error description
        error: String,
    },
}

/// Builds the HTTP client shared by all crawl tasks
///
/// The whole request, body included, is bounded by
/// `request-timeout-secs`; connecting gets at most the same budget.
///
/// # Example
///
/// ```no_run
/// use product_harvest::config::CrawlerConfig;
/// use product_harvest::crawler::build_http_client;
///
/// let client = build_http_client(&CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_secs(config.request_timeout_secs);

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL and classifies the outcome
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx | Success with body |
/// | Other status | HttpError |
/// | Timeout | NetworkError "Request timeout" |
/// | Connection failure | NetworkError "Connection refused" |
/// | Body read failure | NetworkError |
///
/// Redirects are followed by the client. The response is dropped before
/// this function returns, releasing its connection back to the pool.
pub async fn fetch_url(client: &Client, url: &str) -> FetchResult {
    match client.get(url).send().await {
        Ok(response) => {
            let status = response.status();

            if !status.is_success() {
                return FetchResult::HttpError {
                    status_code: status.as_u16(),
                    reason: status.canonical_reason().unwrap_or("").to_string(),
                };
            }

            match response.text().await {
                Ok(body) => FetchResult::Success {
                    status_code: status.as_u16(),
                    body,
                },
                Err(e) => FetchResult::NetworkError {
                    error: classify_error(&e),
                },
            }
        }
        Err(e) => FetchResult::NetworkError {
            error: classify_error(&e),
        },
    }
}

fn classify_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        format!("Connection refused: {}", e)
    } else {
        e.to_string()
    }
}
