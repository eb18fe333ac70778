// src/error.rs
//! Error taxonomy for the enrichment pipeline.
//!
//! Only `FetchFailed` (and request validation) ever reaches a caller. Analyzer
//! failures are folded into per-task defaults at the dispatch join, and cache
//! write problems degrade to "no caching for this call" — both are logged,
//! never surfaced.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichError {
    /// The document source could not be downloaded or parsed. Terminal for the
    /// request; not retried.
    #[error("could not fetch article {url}: {detail}")]
    FetchFailed { url: String, detail: String },

    /// The request itself is malformed (bad URL, text too short, ...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl EnrichError {
    pub fn fetch_failed(url: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::FetchFailed {
            url: url.into(),
            detail: detail.to_string(),
        }
    }

    /// Stable machine-readable kind for the JSON error body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FetchFailed { .. } => "fetch_failed",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }
}

pub type EnrichResult<T> = Result<T, EnrichError>;
