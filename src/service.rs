// src/service.rs
//! # Enrichment service
//! Fan-out dispatch over the analysis engines, aggregation into one
//! `EnrichedRecord`, and the cache-aside request coordinator with detached
//! background refresh.
//!
//! Failure policy: only the document fetch can fail a request. Every analyzer
//! outcome is folded into its payload or its documented default at the join —
//! a failed task is logged and counted, never propagated.

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::cache::{cache_key, ArticleCache, CacheEntry};
use crate::config::EnrichConfig;
use crate::document::{DocumentSource, NormalizedDocument};
use crate::enrich::{
    filter_entities, Entity, EntityEngine, EntityFilterOptions, Keyword, KeywordEngine,
    SentimentAnalyzer, SentimentScores, ShareCountProvider, SocialExtractor,
};
use crate::error::EnrichResult;

/// The aggregate returned to callers: document fields + every analysis
/// payload. Always fully populated; failed tasks contribute defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub title: String,
    pub date: Option<DateTime<Utc>>,
    pub text: String,
    pub markdown: String,
    pub html: String,
    pub summary: String,
    pub keywords: Vec<Keyword>,
    pub authors: Vec<String>,
    pub banner: Option<String>,
    pub images: Vec<String>,
    pub videos: Vec<String>,
    pub entities: Vec<Entity>,
    pub social_accounts: BTreeMap<String, Vec<String>>,
    pub sentiment: SentimentScores,
    pub accounts: BTreeMap<String, String>,
    pub social_shares: BTreeMap<String, i64>,
    pub processing_time: f64,
}

/// All analysis collaborators, constructed once at startup and injected.
/// Nothing here loads lazily on the first request.
pub struct Engines {
    pub entities: EntityEngine,
    pub sentiment: SentimentAnalyzer,
    pub keywords: KeywordEngine,
    pub social: SocialExtractor,
    pub shares: Arc<dyn ShareCountProvider>,
}

impl Engines {
    pub fn new(shares: Arc<dyn ShareCountProvider>) -> Self {
        Self {
            entities: EntityEngine::new(),
            sentiment: SentimentAnalyzer::new(),
            keywords: KeywordEngine::new(),
            social: SocialExtractor::new(),
            shares,
        }
    }
}

/// What to enrich: a URL to fetch, or raw text supplied directly.
#[derive(Debug, Clone)]
pub enum EnrichSource {
    Url(String),
    RawText(String),
}

impl EnrichSource {
    /// The string the cache key is derived from.
    fn key_material(&self) -> &str {
        match self {
            Self::Url(u) => u,
            Self::RawText(t) => t,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnrichRequest {
    pub source: EnrichSource,
    pub use_cache: bool,
    pub filter: EntityFilterOptions,
}

/// How the response was produced, relative to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    Hit,
    Stale,
    Miss,
    Bypass,
}

impl CacheStatus {
    pub fn header_value(&self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Stale => "STALE",
            Self::Miss => "MISS",
            Self::Bypass => "BYPASS",
        }
    }

    /// True when the record came out of the cache rather than a pipeline run.
    pub fn served_from_cache(&self) -> bool {
        matches!(self, Self::Hit | Self::Stale)
    }
}

/// Per-task outcome folded at the join point. A failed task never fails the
/// request; it degrades to the task's default payload.
enum TaskOutcome<T> {
    Ok(T),
    Failed(String),
}

impl<T: Default> TaskOutcome<T> {
    fn or_default(self, task: &'static str) -> T {
        match self {
            Self::Ok(v) => v,
            Self::Failed(reason) => {
                warn!(task, %reason, "analyzer failed, substituting default");
                counter!("analyzer_failures_total", "task" => task).increment(1);
                T::default()
            }
        }
    }
}

fn join_outcome<T>(
    res: Result<anyhow::Result<T>, tokio::task::JoinError>,
) -> TaskOutcome<T> {
    match res {
        Ok(Ok(v)) => TaskOutcome::Ok(v),
        Ok(Err(e)) => TaskOutcome::Failed(e.to_string()),
        Err(e) => TaskOutcome::Failed(format!("task panicked or was cancelled: {e}")),
    }
}

/// Payloads of one full analysis pass, already default-substituted.
struct AnalysisOutput {
    entities: Vec<Entity>,
    social_accounts: BTreeMap<String, Vec<String>>,
    social_shares: BTreeMap<String, i64>,
    sentiment: SentimentScores,
    markdown: String,
    keywords: Vec<Keyword>,
    accounts: BTreeMap<String, String>,
    summary: String,
}

#[derive(Clone)]
pub struct EnrichService {
    engines: Arc<Engines>,
    source: Arc<dyn DocumentSource>,
    cache: Arc<ArticleCache>,
    config: Arc<EnrichConfig>,
}

impl EnrichService {
    pub fn new(
        engines: Arc<Engines>,
        source: Arc<dyn DocumentSource>,
        cache: Arc<ArticleCache>,
        config: Arc<EnrichConfig>,
    ) -> Self {
        Self {
            engines,
            source,
            cache,
            config,
        }
    }

    pub fn engines(&self) -> &Engines {
        &self.engines
    }

    pub fn config(&self) -> &EnrichConfig {
        &self.config
    }

    /// Cache-aside entry point.
    ///
    /// Fresh hit → cached record, no work. Stale hit → the stale record is
    /// returned immediately and exactly one detached refresh job is scheduled.
    /// Miss (or `use_cache == false`) → full synchronous pipeline + cache
    /// write. Concurrent misses for the same key are not coordinated: both run
    /// the pipeline and the last write wins.
    pub async fn enrich(&self, req: EnrichRequest) -> EnrichResult<(EnrichedRecord, CacheStatus)> {
        counter!("enrich_requests_total").increment(1);

        let key = cache_key(req.source.key_material());

        if !req.use_cache {
            let record = self.compute(&req.source, &req.filter).await?;
            self.cache.put(&key, record.clone(), Utc::now());
            gauge!("enrich_cache_entries").set(self.cache.len() as f64);
            counter!("enrich_cache_bypass_total").increment(1);
            return Ok((record, CacheStatus::Bypass));
        }

        if let Some(entry) = self.cache.get(&key) {
            let now = Utc::now();
            if !ArticleCache::is_stale(&entry, now, self.config.cache_ttl()) {
                counter!("enrich_cache_hits_total").increment(1);
                return Ok((entry.record, CacheStatus::Hit));
            }
            counter!("enrich_cache_stale_total").increment(1);
            self.spawn_refresh(req.source.clone(), key, req.filter.clone());
            return Ok((entry.record, CacheStatus::Stale));
        }

        counter!("enrich_cache_misses_total").increment(1);
        let record = self.compute(&req.source, &req.filter).await?;
        self.cache.put(&key, record.clone(), Utc::now());
        gauge!("enrich_cache_entries").set(self.cache.len() as f64);
        Ok((record, CacheStatus::Miss))
    }

    /// Cached entries, newest creation date first. Returns `(total, page)`.
    pub fn list_cached(&self, limit: usize, offset: usize) -> (usize, Vec<CacheEntry>) {
        self.cache.list(limit, offset)
    }

    /// Full pipeline: resolve the document, fan out the analyzers, aggregate.
    /// The processing-time clock starts before the fetch.
    async fn compute(
        &self,
        source: &EnrichSource,
        filter: &EntityFilterOptions,
    ) -> EnrichResult<EnrichedRecord> {
        let started = Instant::now();

        let doc = match source {
            EnrichSource::Url(url) => self.source.fetch(url).await?,
            EnrichSource::RawText(text) => NormalizedDocument::from_raw_text(text),
        };

        let output = self.run_analysis(&doc, filter).await;
        Ok(Self::aggregate(doc, output, started))
    }

    /// Launch every analyzer concurrently and wait for all of them; no task's
    /// failure short-circuits the join.
    async fn run_analysis(
        &self,
        doc: &NormalizedDocument,
        filter: &EntityFilterOptions,
    ) -> AnalysisOutput {
        let engines = &self.engines;
        let max_chars = self.config.analysis.max_chars;
        let top_n = self.config.analysis.keyword_top_n;

        // Entity recognition alone runs on a truncated view of very large
        // documents; every other analyzer sees the full text.
        let entity_text: Arc<str> = if doc.raw_text.chars().count() > max_chars {
            warn!(
                chars = doc.raw_text.chars().count(),
                max_chars, "text truncated for entity recognition"
            );
            Arc::from(doc.raw_text.chars().take(max_chars).collect::<String>())
        } else {
            Arc::from(doc.raw_text.as_str())
        };
        let text: Arc<str> = Arc::from(doc.raw_text.as_str());
        // Link scanning wants the whole page; Markdown only the article body.
        let page_html: Arc<str> = Arc::from(doc.raw_html.as_str());
        let content_html: Arc<str> = Arc::from(doc.content_html.as_str());
        let source_url = doc.source_url.clone();

        let entities = tokio::spawn({
            let engines = engines.clone();
            let filter = filter.clone();
            let text = entity_text;
            async move { Ok::<_, anyhow::Error>(filter_entities(engines.entities.recognize(&text), &filter)) }
        });

        let social_accounts = tokio::spawn({
            let engines = engines.clone();
            let html = page_html.clone();
            let url = source_url.clone();
            async move { Ok::<_, anyhow::Error>(engines.social.profile_links(url.as_deref(), &html)) }
        });

        let social_shares = tokio::spawn({
            let engines = engines.clone();
            let url = source_url.clone();
            let enabled = self.config.analysis.share_counts_enabled;
            async move {
                match url {
                    Some(u) if enabled => engines.shares.fetch(&u).await,
                    _ => Ok(BTreeMap::new()),
                }
            }
        });

        let sentiment = tokio::spawn({
            let engines = engines.clone();
            let text = text.clone();
            async move { Ok::<_, anyhow::Error>(engines.sentiment.score(&text)) }
        });

        let markdown = tokio::spawn({
            let html = content_html.clone();
            async move { Ok::<_, anyhow::Error>(crate::enrich::markdown::html_to_markdown(&html)) }
        });

        let keywords = tokio::spawn({
            let engines = engines.clone();
            let text = text.clone();
            async move { Ok::<_, anyhow::Error>(engines.keywords.extract(&text, top_n)) }
        });

        let accounts = tokio::spawn({
            let engines = engines.clone();
            let text = text.clone();
            async move { Ok::<_, anyhow::Error>(engines.social.accounts(&text)) }
        });

        let summary = tokio::spawn({
            let engines = engines.clone();
            let text = text.clone();
            async move { Ok::<_, anyhow::Error>(engines.keywords.summarize(&text, 3, None)) }
        });

        let (entities, social_accounts, social_shares, sentiment, markdown, keywords, accounts, summary) = tokio::join!(
            entities,
            social_accounts,
            social_shares,
            sentiment,
            markdown,
            keywords,
            accounts,
            summary
        );

        AnalysisOutput {
            entities: join_outcome(entities).or_default("entities"),
            social_accounts: join_outcome(social_accounts).or_default("social_accounts"),
            social_shares: join_outcome(social_shares).or_default("social_shares"),
            sentiment: join_outcome(sentiment).or_default("sentiment"),
            markdown: join_outcome(markdown).or_default("markdown"),
            keywords: join_outcome(keywords).or_default("keywords"),
            accounts: join_outcome(accounts).or_default("accounts"),
            summary: join_outcome(summary).or_default("summary"),
        }
    }

    /// Pure assembly; every input is already default-substituted, so there is
    /// no failure mode here.
    fn aggregate(
        doc: NormalizedDocument,
        output: AnalysisOutput,
        started: Instant,
    ) -> EnrichedRecord {
        EnrichedRecord {
            title: doc.title,
            date: doc.publish_date,
            text: doc.raw_text,
            markdown: output.markdown,
            html: doc.content_html,
            summary: output.summary,
            keywords: output.keywords,
            authors: doc.authors,
            banner: doc.top_image,
            images: doc.images,
            videos: doc.videos,
            entities: output.entities,
            social_accounts: output.social_accounts,
            sentiment: output.sentiment,
            accounts: output.accounts,
            social_shares: output.social_shares,
            processing_time: started.elapsed().as_secs_f64(),
        }
    }

    /// Detached refresh: re-run the pipeline for `key` and overwrite the
    /// entry. The job outlives the originating request; its failure is logged
    /// and leaves the stale entry in place.
    fn spawn_refresh(&self, source: EnrichSource, key: String, filter: EntityFilterOptions) {
        let svc = self.clone();
        counter!("refresh_jobs_total").increment(1);
        tokio::spawn(async move {
            match svc.compute(&source, &filter).await {
                Ok(record) => {
                    svc.cache.put(&key, record, Utc::now());
                    info!(key = %key, "cache entry refreshed");
                }
                Err(e) => {
                    counter!("refresh_failures_total").increment(1);
                    warn!(key = %key, error = %e, "background refresh failed, keeping stale entry");
                }
            }
        });
    }
}
