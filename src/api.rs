// src/api.rs
//! HTTP surface over the enrichment service. Handlers stay thin: validation,
//! one call into `EnrichService` or an engine, serialization. The cache
//! diagnostics header `X-Enrich-Cache` carries HIT/STALE/MISS/BYPASS.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::cache::CacheEntry;
use crate::enrich::{filter_entities, Entity, EntityFilterOptions, Keyword, SentimentScores};
use crate::error::EnrichError;
use crate::service::{CacheStatus, EnrichRequest, EnrichService, EnrichSource, EnrichedRecord};

pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Raw-text endpoints reject trivially short input, matching the article
/// pipeline's keyword short-circuit threshold.
const MIN_TEXT_LEN: usize = 10;

#[derive(Clone)]
pub struct AppState {
    pub service: EnrichService,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/nlp/article", post(process_article))
        .route("/api/v1/nlp/articles/cached", get(list_cached_articles))
        .route("/api/v1/nlp/tags", post(extract_tags))
        .route("/api/v1/nlp/sentiment", post(analyze_sentiment))
        .route("/api/v1/nlp/entities", post(extract_entities))
        .route("/api/v1/nlp/summarize", post(summarize_text))
        .route("/api/v1/nlp/health", get(health))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

impl IntoResponse for EnrichError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": { "kind": self.kind(), "detail": self.to_string() }
        });
        (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
    }
}

#[derive(Deserialize)]
struct ArticleAction {
    link: String,
    #[serde(default = "default_true")]
    cache: bool,
    #[serde(default)]
    filter: Option<EntityFilterOptions>,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
struct ArticleResponse {
    data: EnrichedRecord,
    cached: bool,
}

async fn process_article(
    State(state): State<AppState>,
    Json(body): Json<ArticleAction>,
) -> Result<Response, EnrichError> {
    if body.link.trim().is_empty() {
        return Err(EnrichError::InvalidRequest("link must not be empty".into()));
    }

    let req = EnrichRequest {
        source: EnrichSource::Url(body.link),
        use_cache: body.cache,
        filter: body.filter.unwrap_or_default(),
    };
    let (record, status) = state.service.enrich(req).await?;

    let payload = ArticleResponse {
        cached: status.served_from_cache(),
        data: record,
    };
    Ok(with_cache_header(status, payload))
}

fn with_cache_header(status: CacheStatus, body: ArticleResponse) -> Response {
    (
        StatusCode::OK,
        [("x-enrich-cache", status.header_value())],
        Json(body),
    )
        .into_response()
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(Serialize)]
struct CachedArticle {
    cache_key: String,
    cached_at: DateTime<Utc>,
    article: EnrichedRecord,
}

#[derive(Serialize)]
struct CachedArticlesList {
    total_articles: usize,
    articles: Vec<CachedArticle>,
}

async fn list_cached_articles(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Json<CachedArticlesList> {
    let limit = q.limit.clamp(1, 500);
    let (total, page) = state.service.list_cached(limit, q.offset);
    let articles = page
        .into_iter()
        .map(|e: CacheEntry| CachedArticle {
            cache_key: e.key,
            cached_at: e.stored_at,
            article: e.record,
        })
        .collect();
    Json(CachedArticlesList {
        total_articles: total,
        articles,
    })
}

#[derive(Deserialize)]
struct TextAction {
    text: String,
    #[serde(default)]
    max_length: Option<usize>,
    #[serde(default)]
    filter: Option<EntityFilterOptions>,
}

fn require_text(action: &TextAction) -> Result<&str, EnrichError> {
    let text = action.text.trim();
    if text.chars().count() < MIN_TEXT_LEN {
        return Err(EnrichError::InvalidRequest(format!(
            "text must be at least {MIN_TEXT_LEN} characters"
        )));
    }
    Ok(text)
}

#[derive(Serialize)]
struct DataResponse<T> {
    data: T,
}

async fn extract_tags(
    State(state): State<AppState>,
    Json(body): Json<TextAction>,
) -> Result<Json<DataResponse<Vec<Keyword>>>, EnrichError> {
    let text = require_text(&body)?;
    let top_n = state.service.config().analysis.keyword_top_n;
    let keywords = state.service.engines().keywords.extract(text, top_n);
    Ok(Json(DataResponse { data: keywords }))
}

async fn analyze_sentiment(
    State(state): State<AppState>,
    Json(body): Json<TextAction>,
) -> Result<Json<DataResponse<SentimentScores>>, EnrichError> {
    let text = require_text(&body)?;
    let scores = state.service.engines().sentiment.score(text);
    Ok(Json(DataResponse { data: scores }))
}

async fn extract_entities(
    State(state): State<AppState>,
    Json(body): Json<TextAction>,
) -> Result<Json<DataResponse<Vec<Entity>>>, EnrichError> {
    let text = require_text(&body)?;
    let filter = body.filter.clone().unwrap_or_default();
    let raw = state.service.engines().entities.recognize(text);
    Ok(Json(DataResponse {
        data: filter_entities(raw, &filter),
    }))
}

async fn summarize_text(
    State(state): State<AppState>,
    Json(body): Json<TextAction>,
) -> Result<Json<DataResponse<String>>, EnrichError> {
    let text = require_text(&body)?;
    let summary = state
        .service
        .engines()
        .keywords
        .summarize(text, 3, body.max_length);
    Ok(Json(DataResponse { data: summary }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: API_VERSION,
        timestamp: Utc::now().to_rfc3339(),
    })
}
