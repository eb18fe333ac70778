// src/config.rs
//! Service configuration: TOML file + environment overrides.
//!
//! The file path comes from `ENRICHER_CONFIG_PATH` (default
//! `config/enricher.toml`). A missing or invalid file falls back to defaults so
//! the service always boots; individual values are sanitized after parse.

use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/enricher.toml";
pub const ENV_CONFIG_PATH: &str = "ENRICHER_CONFIG_PATH";

/// Platforms we ask the share-count provider about, and whose profile links we
/// recognize in documents.
pub const SOCIAL_PLATFORMS: &[&str] = &[
    "facebook",
    "pinterest",
    "linkedin",
    "reddit",
    "twitter",
    "instagram",
];

fn default_user_agent() -> String {
    "article-enricher/0.1 (+https://github.com/article-enricher)".to_string()
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_true() -> bool {
    true
}
fn default_capacity() -> usize {
    100
}
fn default_ttl_secs() -> u64 {
    3600
}
fn default_max_chars() -> usize {
    500_000
}
fn default_top_n() -> usize {
    5
}
fn default_bind() -> String {
    "0.0.0.0:1098".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub follow_redirects: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            follow_redirects: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Bounded number of enriched records kept in memory.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Entries older than this are served stale and refreshed in background.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Entity recognition input is truncated to this many chars; other
    /// analyzers always receive the full text.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Keyword count returned per document.
    #[serde(default = "default_top_n")]
    pub keyword_top_n: usize,
    /// Whether share counts are fetched over the network at all.
    #[serde(default)]
    pub share_counts_enabled: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            keyword_top_n: default_top_n(),
            share_counts_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrichConfig {
    #[serde(default = "default_bind")]
    #[serde(alias = "bind_addr")]
    pub bind: String,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl EnrichConfig {
    /// Load from the configured path; fall back to defaults on any error so
    /// startup never depends on a config file being present.
    pub fn load() -> Self {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let cfg = match fs::read_to_string(&path) {
            Ok(raw) => match toml::from_str::<EnrichConfig>(&raw) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "invalid config file, using defaults");
                    EnrichConfig::with_default_bind()
                }
            },
            Err(_) => EnrichConfig::with_default_bind(),
        };

        cfg.sanitized()
    }

    fn with_default_bind() -> Self {
        Self {
            bind: default_bind(),
            ..Self::default()
        }
    }

    /// Clamp values into usable ranges.
    pub fn sanitized(mut self) -> Self {
        if self.bind.trim().is_empty() {
            self.bind = default_bind();
        }
        if self.cache.capacity == 0 {
            self.cache.capacity = 1;
        }
        if self.fetch.timeout_secs == 0 {
            self.fetch.timeout_secs = default_timeout_secs();
        }
        if self.analysis.max_chars < 1_000 {
            self.analysis.max_chars = 1_000;
        }
        if self.analysis.keyword_top_n == 0 {
            self.analysis.keyword_top_n = default_top_n();
        }
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = EnrichConfig::default().sanitized();
        assert_eq!(cfg.cache.capacity, 100);
        assert_eq!(cfg.cache.ttl_secs, 3600);
        assert_eq!(cfg.fetch.timeout_secs, 15);
        assert_eq!(cfg.analysis.max_chars, 500_000);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut cfg = EnrichConfig::default();
        cfg.cache.capacity = 0;
        assert_eq!(cfg.sanitized().cache.capacity, 1);
    }

    #[test]
    fn parses_partial_toml() {
        let raw = r#"
            [cache]
            capacity = 7
            ttl_secs = 60
        "#;
        let cfg: EnrichConfig = toml::from_str(raw).expect("partial toml");
        let cfg = cfg.sanitized();
        assert_eq!(cfg.cache.capacity, 7);
        assert_eq!(cfg.cache.ttl_secs, 60);
        // untouched sections keep defaults
        assert_eq!(cfg.fetch.timeout_secs, 15);
    }
}
