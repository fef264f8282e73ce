//! End-to-end crawls against mock HTTP servers
//!
//! These tests use wiremock to serve small sites and run the real HTTP
//! fetcher, HTML parser and SQLite storage over them.

use std::time::Duration;
use sumi_crawl::config::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use sumi_crawl::crawler::{run_crawl, Crawler, HtmlParser, HttpFetcher};
use sumi_crawl::output::load_statistics;
use sumi_crawl::storage::SqliteStorage;
use sumi_crawl::Termination;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn crawler_config(seeds: Vec<String>) -> CrawlerConfig {
    CrawlerConfig {
        seeds,
        fetch_workers: 4,
        parse_workers: 2,
        crawl_delay_ms: 0,
        max_fetch_retries: 2,
        fetch_timeout_ms: 5_000,
        retry_delay_ms: 10,
        queue_capacity: 32,
        handoff_capacity: 8,
        pre_fetch_delay_ms: 0,
    }
}

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html")
}

async fn mount_page(server: &MockServer, route: &str, response: ResponseTemplate, hits: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .expect(hits)
        .mount(server)
        .await;
}

/// Serves a small site exercising links, duplicates, 404, 5xx and non-HTML
async fn small_site() -> MockServer {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        html(
            r#"<html><head><title>Home</title></head><body>
                <a href="/a">A</a>
                <a href="/b">B</a>
                <a href="/a#again">A again</a>
                <a href="mailto:owner@example.com">mail</a>
            </body></html>"#,
        ),
        1,
    )
    .await;
    mount_page(
        &server,
        "/a",
        html(
            r#"<title>Page A</title>
               <a href="/b">B</a>
               <a href="/missing">gone</a>
               <a href="/flaky">flaky</a>"#,
        ),
        1,
    )
    .await;
    mount_page(
        &server,
        "/b",
        html(r#"<title>Page B</title><a href="/report.pdf">report</a><a href="/">home</a>"#),
        1,
    )
    .await;
    mount_page(
        &server,
        "/report.pdf",
        ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"),
        1,
    )
    .await;
    mount_page(&server, "/missing", ResponseTemplate::new(404), 1).await;
    mount_page(&server, "/flaky", ResponseTemplate::new(503), 3).await;

    server
}

#[tokio::test]
async fn test_full_crawl_stores_titled_pages() {
    let server = small_site().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("crawl.db");

    let config = Config {
        crawler: crawler_config(vec![format!("{}/", base)]),
        user_agent: user_agent(),
        output: OutputConfig {
            database_path: db_path.to_string_lossy().into_owned(),
        },
    };

    let summary = run_crawl(config).await.unwrap();

    assert_eq!(summary.termination, Termination::Completed);
    assert_eq!(summary.urls_visited, 6);
    assert_eq!(summary.stats.dispatched, 6);
    assert_eq!(summary.stats.fetched, 4);
    assert_eq!(summary.stats.fetch_failures, 2);
    assert_eq!(summary.stats.retries, 2);
    assert_eq!(summary.stats.non_html, 1);
    assert_eq!(summary.stats.pages_stored, 3);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let home = storage.get_page(&format!("{}/", base)).unwrap().unwrap();
    assert_eq!(home.title, "Home");
    assert_eq!(home.status_code, Some(200));
    assert!(storage.get_page(&format!("{}/missing", base)).unwrap().is_none());
    assert!(storage.get_page(&format!("{}/flaky", base)).unwrap().is_none());

    let stats = load_statistics(&storage).unwrap();
    assert_eq!(stats.total_pages, 3);
    assert_eq!(stats.unique_domains, 1);
}

#[tokio::test]
async fn test_crawl_session_with_injected_storage() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        html(r#"<title>Root</title><a href="/next">next</a>"#),
        1,
    )
    .await;
    mount_page(&server, "/next", html("<title>Next</title>"), 1).await;

    let dir = TempDir::new().unwrap();
    let storage = std::sync::Arc::new(SqliteStorage::new(&dir.path().join("s.db")).unwrap());

    let crawler = Crawler::new(
        crawler_config(vec![]),
        HttpFetcher::new(&user_agent()).unwrap(),
        HtmlParser::new().unwrap(),
        std::sync::Arc::clone(&storage),
    );
    let summary = crawler.run([format!("{}/", server.uri())]).await.unwrap();

    assert_eq!(summary.termination, Termination::Completed);
    assert_eq!(storage.count_pages().unwrap(), 2);
    let next = storage
        .get_page(&format!("{}/next", server.uri()))
        .unwrap()
        .unwrap();
    assert_eq!(next.title, "Next");
}

#[tokio::test]
async fn test_crawl_delay_applies_to_mock_host() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        html(r#"<a href="/1">1</a><a href="/2">2</a>"#),
        1,
    )
    .await;
    mount_page(&server, "/1", html("<title>1</title>"), 1).await;
    mount_page(&server, "/2", html("<title>2</title>"), 1).await;

    let mut config = crawler_config(vec![]);
    config.crawl_delay_ms = 100;

    let storage = sumi_crawl::storage::MemoryStorage::new();
    let crawler = Crawler::new(
        config,
        HttpFetcher::new(&user_agent()).unwrap(),
        HtmlParser::new().unwrap(),
        storage,
    );
    let summary = crawler.run([format!("{}/", server.uri())]).await.unwrap();

    // Three dispatches to one host need at least two full delays.
    assert_eq!(summary.stats.dispatched, 3);
    assert!(summary.elapsed >= Duration::from_millis(200));
}
