// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod cache;
pub mod config;
pub mod document;
pub mod enrich;
pub mod error;
pub mod metrics;
pub mod service;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::cache::{cache_key, ArticleCache, CacheEntry};
pub use crate::document::{DocumentSource, HttpDocumentSource, NormalizedDocument};
pub use crate::error::{EnrichError, EnrichResult};
pub use crate::service::{
    CacheStatus, EnrichRequest, EnrichService, EnrichSource, EnrichedRecord, Engines,
};

use std::sync::Arc;

use crate::config::EnrichConfig;
use crate::enrich::{DisabledShareCounts, HttpShareCounts, ShareCountProvider};

/// Build the full application state from a config: engines constructed once,
/// share provider picked by configuration, cache sized from the config. Used
/// by the binary and by in-process router tests.
pub fn build_state(config: EnrichConfig) -> AppState {
    let config = Arc::new(config);

    let shares: Arc<dyn ShareCountProvider> = if config.analysis.share_counts_enabled {
        let http = reqwest::Client::builder()
            .user_agent(config.fetch.user_agent.clone())
            .timeout(config.fetch_timeout())
            .build()
            .expect("reqwest client");
        Arc::new(HttpShareCounts::new(http))
    } else {
        Arc::new(DisabledShareCounts)
    };

    let engines = Arc::new(Engines::new(shares));
    let source = Arc::new(HttpDocumentSource::new(&config.fetch));
    let cache = Arc::new(ArticleCache::new(config.cache.capacity));

    AppState {
        service: EnrichService::new(engines, source, cache, config),
    }
}
