// src/enrich/mod.rs
//! Analysis engines invoked by the dispatcher: entity recognition + filtering,
//! sentiment scoring, keyword extraction, social reference lookup and
//! HTML→Markdown rendering. All engines are constructed once at startup and
//! injected; none load anything lazily on the first request.

pub mod entities;
pub mod keywords;
pub mod markdown;
pub mod sentiment;
pub mod social;

pub use entities::{filter_entities, Entity, EntityEngine, EntityFilterOptions};
pub use keywords::{Keyword, KeywordEngine};
pub use sentiment::{SentimentAnalyzer, SentimentScores};
pub use social::{DisabledShareCounts, HttpShareCounts, ShareCountProvider, SocialExtractor};
