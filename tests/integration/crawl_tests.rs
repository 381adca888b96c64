//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the shop and run whole
//! harvests end-to-end against temporary checkpoint files.

use product_harvest::config::{parse_config, Config};
use product_harvest::crawler::{run_harvest, CrawlEngine, HarvestOptions};
use product_harvest::ledger::{CheckpointLedger, CheckpointPaths};
use product_harvest::planner::WorkItem;
use product_harvest::source::create_summary_table;
use product_harvest::HarvestError;
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn product_page(name: &str) -> String {
    format!(
        r#"<html><body><h1 class="page-title"><span class="base">{}</span></h1></body></html>"#,
        name
    )
}

/// Writes a JSON-Lines behaviour export with one detail view per product
fn write_jsonl(path: &Path, products: &[(&str, &str)]) {
    let lines: Vec<String> = products
        .iter()
        .map(|(id, url)| {
            format!(
                r#"{{"collection":"view_product_detail","product_id":"{}","current_url":"{}"}}"#,
                id, url
            )
        })
        .collect();
    fs::write(path, lines.join("\n")).unwrap();
}

/// Builds a config over the files in `dir`, fetching from `server`
fn test_config(dir: &TempDir, server: &MockServer, source: &str, extra_crawler: &str) -> Config {
    let p = |name: &str| dir.path().join(name).display().to_string();
    parse_config(&format!(
        r#"
[source]
{source}
event-collections = ["view_product_detail", "product_view_all_recommend_clicked"]

[crawler]
concurrency = 4
delay-min-ms = 0
delay-max-ms = 0
retry-delay-ms = 50
request-timeout-secs = 5
base-url = "{base}/"
{extra_crawler}

[output]
universe-cache-path = "{universe}"
processed-ids-path = "{processed}"
success-path = "{success}"
failed-path = "{failed}"
"#,
        source = source,
        base = server.uri(),
        extra_crawler = extra_crawler,
        universe = p("universe.json"),
        processed = p("processed.json"),
        success = p("products.csv"),
        failed = p("failed.csv"),
    ))
    .unwrap()
}

fn jsonl_source(dir: &TempDir) -> String {
    format!(
        "kind = \"jsonl\"\npath = \"{}\"",
        dir.path().join("events.jsonl").display()
    )
}

fn ledger_for(config: &Config) -> Arc<CheckpointLedger> {
    Arc::new(
        CheckpointLedger::load(
            CheckpointPaths::from(&config.output),
            config.extract.field_names(),
            config.crawler.checkpoint_interval,
        )
        .unwrap(),
    )
}

fn failure_rows(dir: &TempDir) -> Vec<Vec<String>> {
    let mut reader = csv::Reader::from_path(dir.path().join("failed.csv")).unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map(|r| r.len()).unwrap_or(0)
}

#[tokio::test]
async fn test_harvest_from_sqlite_store() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_page("X")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b.html"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let db_path = dir.path().join("behaviour.db");
    {
        let conn = Connection::open(&db_path).unwrap();
        create_summary_table(&conn, "summary").unwrap();
        conn.execute(
            "INSERT INTO summary (collection, product_id, current_url) VALUES (?1, ?2, ?3)",
            ["view_product_detail", "A", "/a.html"],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO summary (collection, viewing_product_id, referrer_url) VALUES (?1, ?2, ?3)",
            ["product_view_all_recommend_clicked", "B", "b.html"],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO summary (collection, product_id, current_url) VALUES (?1, ?2, ?3)",
            ["checkout_success", "C", "/c.html"],
        )
        .unwrap();
    }

    let source = format!("kind = \"sqlite\"\npath = \"{}\"", db_path.display());
    let config = test_config(&dir, &server, &source, "");
    let summary = run_harvest(config, HarvestOptions::default()).await.unwrap();

    assert_eq!(summary.universe_size, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.total_failed_on_disk, 1);

    let products = fs::read_to_string(dir.path().join("products.csv")).unwrap();
    let mut lines = products.lines();
    assert_eq!(lines.next(), Some("product_id,url,product_name"));
    assert_eq!(
        lines.next(),
        Some(format!("A,{}/a.html,X", server.uri()).as_str())
    );
    assert_eq!(lines.next(), None);

    let failures = failure_rows(&dir);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0][0], "B");
    assert!(failures[0][2].starts_with("HTTP error for product_id 'B'"));
    assert!(failures[0][2].contains("404"));

    let processed: Vec<String> =
        serde_json::from_str(&fs::read_to_string(dir.path().join("processed.json")).unwrap())
            .unwrap();
    assert_eq!(processed, vec!["A".to_string(), "B".to_string()]);
}

#[tokio::test]
async fn test_checkpoints_at_interval() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex("^/p/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_page("Ring")))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let mut config = test_config(
        &dir,
        &server,
        &jsonl_source(&dir),
        "checkpoint-interval = 100",
    );
    config.crawler.concurrency = 1;

    let work_list: Vec<WorkItem> = (0..150)
        .map(|i| WorkItem::new(format!("P{}", i), format!("/p/{}.html", i)))
        .collect();
    let ledger = ledger_for(&config);
    let engine = CrawlEngine::from_config(&config).unwrap();
    let outcome = engine.run(work_list, Arc::clone(&ledger)).await;

    assert_eq!(outcome.successes.len(), 150);
    assert_eq!(outcome.stats.completed, 150);
    assert_eq!(ledger.snapshot_count(), 2);

    let products = fs::read_to_string(dir.path().join("products.csv")).unwrap();
    assert_eq!(products.lines().count(), 151);
}

#[tokio::test]
async fn test_throttling_backs_off_and_records_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = test_config(&dir, &server, &jsonl_source(&dir), "");
    let ledger = ledger_for(&config);
    let engine = CrawlEngine::from_config(&config).unwrap();

    let outcome = engine
        .run(vec![WorkItem::new("T", "/throttled.html")], Arc::clone(&ledger))
        .await;

    assert!(outcome.successes.is_empty());
    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].error.contains("429"));
    assert_eq!(outcome.stats.throttle_backoffs, 1);
    assert_eq!(outcome.stats.backoff_time, Duration::from_millis(50));
    assert_eq!(failure_rows(&dir).len(), 1);
}

#[tokio::test]
async fn test_non_throttling_error_does_not_back_off() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = test_config(&dir, &server, &jsonl_source(&dir), "");
    let engine = CrawlEngine::from_config(&config).unwrap();

    let outcome = engine
        .run(vec![WorkItem::new("E", "/error.html")], ledger_for(&config))
        .await;

    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.stats.throttle_backoffs, 0);
    assert_eq!(outcome.stats.backoff_time, Duration::ZERO);
}

#[tokio::test]
async fn test_rerun_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_page("X")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b.html"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    write_jsonl(
        &dir.path().join("events.jsonl"),
        &[("A", "/a.html"), ("B", "/b.html")],
    );
    let config = test_config(&dir, &server, &jsonl_source(&dir), "");

    run_harvest(config.clone(), HarvestOptions::default())
        .await
        .unwrap();
    let requests_after_first = request_count(&server).await;
    let products_after_first = fs::read_to_string(dir.path().join("products.csv")).unwrap();
    assert_eq!(requests_after_first, 2);

    let summary = run_harvest(config, HarvestOptions::default()).await.unwrap();

    assert_eq!(request_count(&server).await, requests_after_first);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.total_failed_on_disk, 1);
    assert_eq!(
        fs::read_to_string(dir.path().join("products.csv")).unwrap(),
        products_after_first
    );
}

#[tokio::test]
async fn test_resume_keeps_earlier_successes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/b.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_page("Bracelet")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    write_jsonl(
        &dir.path().join("events.jsonl"),
        &[("A", "/a.html"), ("B", "/b.html")],
    );
    fs::write(dir.path().join("processed.json"), r#"["A"]"#).unwrap();
    fs::write(
        dir.path().join("products.csv"),
        "product_id,url,product_name\nA,https://shop.test/a.html,Anklet\n",
    )
    .unwrap();

    let config = test_config(&dir, &server, &jsonl_source(&dir), "");
    let summary = run_harvest(config, HarvestOptions::default()).await.unwrap();
    assert_eq!(summary.succeeded, 1);

    let products = fs::read_to_string(dir.path().join("products.csv")).unwrap();
    assert!(products.contains("A,https://shop.test/a.html,Anklet"));
    assert!(products.contains(",Bracelet"));
}

#[tokio::test]
async fn test_outcomes_balance_under_concurrency() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/ok/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_page("Ring")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/gone/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/blank/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><h1>Nope</h1></html>"))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = test_config(
        &dir,
        &server,
        &jsonl_source(&dir),
        "checkpoint-interval = 7",
    );
    let kinds = ["ok", "gone", "blank"];
    let work_list: Vec<WorkItem> = (0..30)
        .map(|i| WorkItem::new(format!("P{}", i), format!("/{}/{}.html", kinds[i % 3], i)))
        .collect();

    let ledger = ledger_for(&config);
    let engine = CrawlEngine::from_config(&config).unwrap();
    let outcome = engine.run(work_list, Arc::clone(&ledger)).await;

    let counters = ledger.counters();
    assert_eq!(counters.processed, 30);
    assert_eq!(counters.processed, counters.succeeded + counters.failed);
    assert_eq!(counters.succeeded, 10);
    assert_eq!(outcome.failures.len(), 20);
    assert_eq!(failure_rows(&dir).len(), 20);
    assert!(outcome
        .failures
        .iter()
        .any(|f| f.error.starts_with("Product name not found for product_id")));

    let processed: Vec<String> =
        serde_json::from_str(&fs::read_to_string(dir.path().join("processed.json")).unwrap())
            .unwrap();
    assert_eq!(processed.len(), 30);
}

#[tokio::test]
async fn test_unreachable_host_is_recorded() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let config = test_config(&dir, &server, &jsonl_source(&dir), "");
    let engine = CrawlEngine::from_config(&config).unwrap();

    let outcome = engine
        .run(
            vec![WorkItem::new("N", "http://127.0.0.1:9/closed.html")],
            ledger_for(&config),
        )
        .await;

    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0]
        .error
        .starts_with("Could not connect to product_id 'N'"));
}

#[tokio::test]
async fn test_empty_universe_aborts_before_crawling() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("events.jsonl"),
        r#"{"collection":"checkout_success","product_id":"Z","current_url":"/z.html"}"#,
    )
    .unwrap();

    let config = test_config(&dir, &server, &jsonl_source(&dir), "");
    let result = run_harvest(config, HarvestOptions::default()).await;

    assert!(matches!(result, Err(HarvestError::EmptyUniverse)));
    assert_eq!(request_count(&server).await, 0);
    assert!(!dir.path().join("universe.json").exists());
}
