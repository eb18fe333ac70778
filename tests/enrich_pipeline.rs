//! Service-level pipeline tests with stubbed collaborators.
//!
//! Covered:
//! - fetch failure is the only error path (propagates as `FetchFailed`)
//! - analyzer failure degrades to the task default, never fails the request
//! - MISS then HIT: the second identical request does not re-fetch
//! - cache opt-out (BYPASS) always recomputes but still stores the result
//! - stale entry is served immediately and refreshed by exactly one
//!   detached job
//! - trivially short raw text short-circuits keywords and summary

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use article_enricher::config::EnrichConfig;
use article_enricher::document::normalize_html;
use article_enricher::enrich::{EntityFilterOptions, ShareCountProvider};
use article_enricher::{
    ArticleCache, CacheStatus, DocumentSource, EnrichError, EnrichRequest, EnrichService,
    EnrichSource, Engines, NormalizedDocument,
};

const ARTICLE_TEXT: &str = "Solar power is growing fast across the grid. \
    Solar panels and solar farms spread through rural districts while wind \
    projects lag behind. Analysts expect solar capacity to double within \
    five years.";

/// Counting document source; optionally fails every fetch.
struct StubSource {
    fetches: AtomicUsize,
    fail: bool,
}

impl StubSource {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            fetches: AtomicUsize::new(0),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fetches: AtomicUsize::new(0),
            fail: true,
        })
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DocumentSource for StubSource {
    async fn fetch(&self, url: &str) -> Result<NormalizedDocument, EnrichError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EnrichError::fetch_failed(url, "connection refused"));
        }
        let html = format!(
            "<html><head><title>Stub Story</title></head><body>\
             <nav>Site navigation links</nav>\
             <article><p>{ARTICLE_TEXT}</p></article>\
             <footer>Footer boilerplate</footer></body></html>"
        );
        let base = url::Url::parse(url).map_err(|e| EnrichError::fetch_failed(url, e))?;
        Ok(normalize_html(&base, &html))
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Share provider that always errors; exercises the fold-to-default join.
struct FailingShares;

#[async_trait::async_trait]
impl ShareCountProvider for FailingShares {
    async fn fetch(&self, _url: &str) -> anyhow::Result<BTreeMap<String, i64>> {
        anyhow::bail!("share api down")
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Share provider that reports a fixed count for one platform.
struct FixedShares;

#[async_trait::async_trait]
impl ShareCountProvider for FixedShares {
    async fn fetch(&self, _url: &str) -> anyhow::Result<BTreeMap<String, i64>> {
        Ok(BTreeMap::from([("reddit".to_string(), 7)]))
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

fn service_with(
    source: Arc<dyn DocumentSource>,
    shares: Arc<dyn ShareCountProvider>,
    ttl_secs: u64,
) -> EnrichService {
    let mut config = EnrichConfig::default().sanitized();
    config.cache.ttl_secs = ttl_secs;
    config.analysis.share_counts_enabled = true;
    EnrichService::new(
        Arc::new(Engines::new(shares)),
        source,
        Arc::new(ArticleCache::new(config.cache.capacity)),
        Arc::new(config),
    )
}

fn url_request(link: &str) -> EnrichRequest {
    EnrichRequest {
        source: EnrichSource::Url(link.to_string()),
        use_cache: true,
        filter: EntityFilterOptions::default(),
    }
}

#[tokio::test]
async fn fetch_failure_propagates_as_error() {
    let svc = service_with(StubSource::failing(), Arc::new(FixedShares), 3600);

    let err = svc
        .enrich(url_request("https://example.com/down"))
        .await
        .expect_err("failing fetch must error");
    match err {
        EnrichError::FetchFailed { url, detail } => {
            assert_eq!(url, "https://example.com/down");
            assert!(detail.contains("connection refused"));
        }
        other => panic!("expected FetchFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn analyzer_failure_degrades_to_default() {
    let svc = service_with(StubSource::ok(), Arc::new(FailingShares), 3600);

    let (record, status) = svc
        .enrich(url_request("https://example.com/a"))
        .await
        .expect("enrich succeeds despite share failure");
    assert_eq!(status, CacheStatus::Miss);

    // The failed task's payload is its default.
    assert!(record.social_shares.is_empty());
    // Every other analyzer still produced output.
    assert!(!record.keywords.is_empty());
    assert!(!record.summary.is_empty());
    assert!(!record.markdown.is_empty());
    assert_eq!(record.title, "Stub Story");
}

#[tokio::test]
async fn successful_shares_flow_into_the_record() {
    let svc = service_with(StubSource::ok(), Arc::new(FixedShares), 3600);

    let (record, _) = svc
        .enrich(url_request("https://example.com/b"))
        .await
        .expect("enrich");
    assert_eq!(record.social_shares.get("reddit"), Some(&7));
}

#[tokio::test]
async fn second_identical_request_hits_without_refetching() {
    let source = StubSource::ok();
    let svc = service_with(source.clone(), Arc::new(FixedShares), 3600);

    let (first, s1) = svc
        .enrich(url_request("https://example.com/c"))
        .await
        .expect("first");
    assert_eq!(s1, CacheStatus::Miss);

    let (second, s2) = svc
        .enrich(url_request("https://example.com/c"))
        .await
        .expect("second");
    assert_eq!(s2, CacheStatus::Hit);
    assert_eq!(first, second);
    assert_eq!(source.fetch_count(), 1, "a fresh hit must not re-fetch");
}

#[tokio::test]
async fn cache_opt_out_recomputes_but_still_stores() {
    let source = StubSource::ok();
    let svc = service_with(source.clone(), Arc::new(FixedShares), 3600);

    let mut req = url_request("https://example.com/d");
    req.use_cache = false;
    let (_, s1) = svc.enrich(req.clone()).await.expect("bypass 1");
    assert_eq!(s1, CacheStatus::Bypass);
    let (_, s2) = svc.enrich(req).await.expect("bypass 2");
    assert_eq!(s2, CacheStatus::Bypass);
    assert_eq!(source.fetch_count(), 2, "bypass always runs the pipeline");

    // The bypass writes warmed the cache for subsequent cached reads.
    let (_, s3) = svc
        .enrich(url_request("https://example.com/d"))
        .await
        .expect("cached read");
    assert_eq!(s3, CacheStatus::Hit);
    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test]
async fn stale_entry_is_served_and_refreshed_exactly_once() {
    let source = StubSource::ok();
    // TTL 0: any entry older than the same millisecond is stale.
    let svc = service_with(source.clone(), Arc::new(FixedShares), 0);

    let (first, s1) = svc
        .enrich(url_request("https://example.com/e"))
        .await
        .expect("prime");
    assert_eq!(s1, CacheStatus::Miss);
    assert_eq!(source.fetch_count(), 1);

    sleep(Duration::from_millis(30)).await;

    let (served, s2) = svc
        .enrich(url_request("https://example.com/e"))
        .await
        .expect("stale read");
    assert_eq!(s2, CacheStatus::Stale, "expired entry is served stale");
    assert_eq!(served, first, "the stale record is returned unchanged");

    // Exactly one detached refresh job runs the pipeline again.
    let mut waited = Duration::ZERO;
    while source.fetch_count() < 2 && waited < Duration::from_secs(2) {
        sleep(Duration::from_millis(10)).await;
        waited += Duration::from_millis(10);
    }
    assert_eq!(source.fetch_count(), 2, "one refresh after one stale read");

    // Give any (incorrect) extra job time to show up.
    sleep(Duration::from_millis(50)).await;
    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test]
async fn markdown_renders_the_article_fragment_only() {
    let svc = service_with(StubSource::ok(), Arc::new(FixedShares), 3600);

    let (record, _) = svc
        .enrich(url_request("https://example.com/frag"))
        .await
        .expect("enrich");
    assert!(record.markdown.contains("Solar power"));
    assert!(!record.markdown.contains("Site navigation"));
    assert!(!record.markdown.contains("Footer boilerplate"));
    // The record carries the extracted fragment, not the whole page.
    assert!(record.html.starts_with("<article"));
}

#[tokio::test]
async fn short_raw_text_short_circuits_keywords_and_summary() {
    let source = StubSource::ok();
    let svc = service_with(source.clone(), Arc::new(FixedShares), 3600);

    let req = EnrichRequest {
        source: EnrichSource::RawText("tiny".to_string()),
        use_cache: true,
        filter: EntityFilterOptions::default(),
    };
    let (record, status) = svc.enrich(req).await.expect("raw text enrich");
    assert_eq!(status, CacheStatus::Miss);
    assert_eq!(source.fetch_count(), 0, "raw text never fetches");
    assert_eq!(record.text, "tiny");
    assert!(record.keywords.is_empty());
    assert!(record.summary.is_empty());
    // No source URL, so no share counts either.
    assert!(record.social_shares.is_empty());
}
