//! Crawl sessions over in-process fake capabilities
//!
//! The fakes make fetch outcomes, link graphs and timing fully scripted, so
//! these tests can assert exact call counts and dispatch spacing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use sumi_crawl::config::CrawlerConfig;
use sumi_crawl::crawler::{
    Crawler, FetchError, FetchedPage, Fetcher, PageParser, ParseError, ParsedPage,
};
use sumi_crawl::storage::{MemoryStorage, PageRecord, PageStore, StorageResult};
use sumi_crawl::{NormalizedUrl, Termination};
use url::Url;

/// Records every fetch call and answers from a per-URL script
#[derive(Default)]
struct FakeFetcher {
    failing: HashMap<String, FetchError>,
    latency: Duration,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl FakeFetcher {
    fn calls_to(&self, url: &str) -> usize {
        let calls = self.calls.lock().unwrap();
        calls.iter().filter(|(called, _)| called == url).count()
    }

    fn dispatch_times(&self) -> Vec<(String, Instant)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Fetcher for FakeFetcher {
    async fn fetch(
        &self,
        url: &NormalizedUrl,
        _timeout: Duration,
    ) -> Result<FetchedPage, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(error) = self.failing.get(url.as_str()) {
            return Err(error.clone());
        }

        Ok(FetchedPage {
            status: 200,
            body: url.to_string(),
            final_url: url.as_url().clone(),
            content_type: Some("text/html".to_string()),
        })
    }
}

/// Answers from a fixed table keyed by page body, which the fake fetcher
/// sets to the page URL
#[derive(Default)]
struct FakeParser {
    pages: HashMap<String, ParsedPage>,
}

impl FakeParser {
    fn page(mut self, url: &str, title: Option<&str>, links: &[&str]) -> Self {
        self.pages.insert(
            url.to_string(),
            ParsedPage {
                title: title.map(str::to_string),
                links: links.iter().map(|l| l.to_string()).collect(),
            },
        );
        self
    }
}

impl PageParser for FakeParser {
    fn parse(&self, body: &str, _base: &Url) -> Result<ParsedPage, ParseError> {
        Ok(self.pages.get(body).cloned().unwrap_or_default())
    }
}

/// Links every page `/n` to `/n+1` on the same host, forever
struct EndlessChain;

impl PageParser for EndlessChain {
    fn parse(&self, _body: &str, base: &Url) -> Result<ParsedPage, ParseError> {
        let n: u64 = base.path().trim_start_matches('/').parse().unwrap_or(0);
        Ok(ParsedPage {
            title: Some(format!("page {n}")),
            links: vec![format!("/{}", n + 1)],
        })
    }
}

/// Store that always fails
struct BrokenStore;

impl PageStore for BrokenStore {
    fn store_page(&self, _record: &PageRecord) -> StorageResult<()> {
        Err(sumi_crawl::storage::StorageError::Database(
            "disk full".to_string(),
        ))
    }
}

fn config() -> CrawlerConfig {
    CrawlerConfig {
        seeds: vec![],
        fetch_workers: 4,
        parse_workers: 2,
        crawl_delay_ms: 0,
        max_fetch_retries: 0,
        fetch_timeout_ms: 1_000,
        retry_delay_ms: 1,
        queue_capacity: 16,
        handoff_capacity: 4,
        pre_fetch_delay_ms: 0,
    }
}

#[tokio::test]
async fn test_self_link_scenario_stores_each_page_once() {
    let fetcher = Arc::new(FakeFetcher::default());
    let parser = FakeParser::default()
        .page(
            "http://a.test/",
            Some("A"),
            &["http://a.test/x", "http://a.test/"],
        )
        .page("http://a.test/x", Some("X"), &[]);
    let store = Arc::new(MemoryStorage::new());

    let crawler = Crawler::new(config(), Arc::clone(&fetcher), parser, Arc::clone(&store));
    let summary = crawler.run(["http://a.test/"]).await.unwrap();

    assert_eq!(summary.termination, Termination::Completed);
    assert_eq!(store.len(), 2);
    assert!(store.contains("http://a.test/"));
    assert!(store.contains("http://a.test/x"));
    assert_eq!(fetcher.calls_to("http://a.test/"), 1);
    assert_eq!(fetcher.calls_to("http://a.test/x"), 1);

    let titles: Vec<String> = store.records().into_iter().map(|r| r.title).collect();
    assert!(titles.contains(&"A".to_string()));
    assert!(titles.contains(&"X".to_string()));
}

#[tokio::test]
async fn test_server_errors_exhaust_retries_and_complete() {
    let mut fetcher = FakeFetcher::default();
    fetcher.failing.insert(
        "http://a.test/".to_string(),
        FetchError::Server { status: 500 },
    );
    let fetcher = Arc::new(fetcher);
    let store = Arc::new(MemoryStorage::new());

    let mut config = config();
    config.max_fetch_retries = 2;

    let crawler = Crawler::new(
        config,
        Arc::clone(&fetcher),
        FakeParser::default().page("http://a.test/", Some("A"), &[]),
        Arc::clone(&store),
    );
    let frontier = Arc::clone(crawler.frontier());
    let summary = crawler.run(["http://a.test/"]).await.unwrap();

    assert_eq!(fetcher.calls_to("http://a.test/"), 3);
    assert!(store.is_empty());
    assert_eq!(summary.termination, Termination::Completed);
    assert_eq!(summary.stats.fetch_failures, 1);
    assert_eq!(summary.stats.retries, 2);
    assert_eq!(frontier.in_flight(), 0);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mut fetcher = FakeFetcher::default();
    fetcher.failing.insert(
        "http://a.test/gone".to_string(),
        FetchError::Client { status: 404 },
    );
    let fetcher = Arc::new(fetcher);

    let mut config = config();
    config.max_fetch_retries = 5;

    let crawler = Crawler::new(
        config,
        Arc::clone(&fetcher),
        FakeParser::default().page("http://a.test/", Some("A"), &["/gone"]),
        MemoryStorage::new(),
    );
    let summary = crawler.run(["http://a.test/"]).await.unwrap();

    assert_eq!(summary.termination, Termination::Completed);
    assert_eq!(fetcher.calls_to("http://a.test/gone"), 1);
    assert_eq!(summary.stats.pages_stored, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_politeness_under_concurrent_load() {
    let delay = Duration::from_millis(60);
    let fetcher = Arc::new(FakeFetcher::default());

    let mut parser = FakeParser::default();
    let mut seeds = Vec::new();
    for host in ["a.test", "b.test", "c.test"] {
        for page in 0..4 {
            seeds.push(format!("http://{host}/{page}"));
        }
    }
    for seed in &seeds {
        parser = parser.page(seed, Some("page"), &[]);
    }

    let mut config = config();
    config.fetch_workers = 8;
    config.crawl_delay_ms = delay.as_millis() as u64;

    let crawler = Crawler::new(config, Arc::clone(&fetcher), parser, MemoryStorage::new());
    let summary = crawler.run(seeds.clone()).await.unwrap();

    assert_eq!(summary.termination, Termination::Completed);
    assert_eq!(summary.stats.dispatched, 12);

    let mut by_host: HashMap<String, Vec<Instant>> = HashMap::new();
    for (url, at) in fetcher.dispatch_times() {
        let host = Url::parse(&url).unwrap().host_str().unwrap().to_string();
        by_host.entry(host).or_default().push(at);
    }
    assert_eq!(by_host.len(), 3);

    // Fetches start right after dispatch; allow a little scheduling jitter.
    let floor = delay - Duration::from_millis(10);
    for (host, mut times) in by_host {
        times.sort();
        for pair in times.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= floor, "{host}: dispatches only {gap:?} apart");
        }
    }
}

#[tokio::test]
async fn test_interrupt_stops_endless_crawl() {
    let fetcher = Arc::new(FakeFetcher {
        latency: Duration::from_millis(5),
        ..FakeFetcher::default()
    });

    let crawler = Crawler::new(config(), fetcher, EndlessChain, MemoryStorage::new());
    let handle = crawler.shutdown_handle();
    let frontier = Arc::clone(crawler.frontier());

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.shutdown();
        handle.shutdown();
    });

    let summary = tokio::time::timeout(Duration::from_secs(5), crawler.run(["http://a.test/0"]))
        .await
        .expect("crawl did not stop after shutdown")
        .unwrap();
    stopper.await.unwrap();

    assert_eq!(summary.termination, Termination::Interrupted);
    assert!(summary.stats.dispatched > 1);
    assert!(frontier.is_shutdown());
    assert!(!frontier.is_closed());
}

#[tokio::test]
async fn test_storage_failures_do_not_stop_crawl() {
    let parser = FakeParser::default()
        .page("http://a.test/", Some("A"), &["/x"])
        .page("http://a.test/x", Some("X"), &[]);

    let crawler = Crawler::new(config(), FakeFetcher::default(), parser, BrokenStore);
    let summary = crawler.run(["http://a.test/"]).await.unwrap();

    assert_eq!(summary.termination, Termination::Completed);
    assert_eq!(summary.stats.dispatched, 2);
    assert_eq!(summary.stats.storage_failures, 2);
    assert_eq!(summary.stats.pages_stored, 0);
}

#[tokio::test]
async fn test_fan_out_beyond_queue_capacity_completes() {
    let links: Vec<String> = (0..40).map(|i| format!("/p{i}")).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
    let parser = FakeParser::default().page("http://a.test/", Some("root"), &link_refs);

    let mut config = config();
    config.queue_capacity = 4;
    config.handoff_capacity = 2;

    let store = Arc::new(MemoryStorage::new());
    let crawler = Crawler::new(config, FakeFetcher::default(), parser, Arc::clone(&store));
    let summary = tokio::time::timeout(Duration::from_secs(10), crawler.run(["http://a.test/"]))
        .await
        .expect("crawl stalled under backpressure")
        .unwrap();

    assert_eq!(summary.termination, Termination::Completed);
    assert_eq!(summary.urls_visited, 41);
    assert_eq!(summary.stats.links_accepted, 40);
    assert_eq!(store.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_seeds_beyond_queue_capacity_are_all_crawled() {
    let seeds: Vec<String> = (0..50).map(|i| format!("http://h{i}.test/")).collect();

    let mut config = config();
    config.queue_capacity = 1;

    // Early seeds finish while later ones still wait for queue space.
    for round in 0..10 {
        let mut parser = FakeParser::default();
        for seed in &seeds {
            parser = parser.page(seed, Some("seed"), &[]);
        }
        let store = Arc::new(MemoryStorage::new());
        let crawler = Crawler::new(
            config.clone(),
            FakeFetcher::default(),
            parser,
            Arc::clone(&store),
        );

        let summary = tokio::time::timeout(Duration::from_secs(10), crawler.run(&seeds))
            .await
            .expect("crawl stalled while seeding")
            .unwrap();

        assert_eq!(summary.termination, Termination::Completed, "round {round}");
        assert_eq!(summary.urls_visited, 50, "round {round}");
        assert_eq!(store.len(), 50, "round {round}");
        for seed in &seeds {
            assert!(store.contains(seed), "round {round}: missing {seed}");
        }
    }
}
