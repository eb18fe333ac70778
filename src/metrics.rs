// src/metrics.rs
//! Prometheus wiring. `Metrics::init` installs the global recorder, registers
//! every series the service emits, and exports the configured TTL; `router`
//! exposes the exposition endpoint. Registration happens here, with the
//! recorder, so all help texts exist before the first request records anything.

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    handle: PrometheusHandle,
}

impl Metrics {
    pub fn init(cache_ttl_secs: u64) -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");

        describe_counter!("enrich_requests_total", "Enrichment requests handled.");
        describe_counter!("enrich_cache_hits_total", "Fresh cache hits.");
        describe_counter!(
            "enrich_cache_stale_total",
            "Stale hits served while refreshing."
        );
        describe_counter!(
            "enrich_cache_misses_total",
            "Cache misses (full pipeline runs)."
        );
        describe_counter!(
            "enrich_cache_bypass_total",
            "Requests that opted out of caching."
        );
        describe_counter!(
            "analyzer_failures_total",
            "Analyzer tasks folded to defaults."
        );
        describe_counter!("refresh_jobs_total", "Background refresh jobs started.");
        describe_counter!(
            "refresh_failures_total",
            "Background refresh jobs that failed."
        );
        describe_gauge!("enrich_cache_entries", "Entries currently cached.");
        describe_gauge!("enrich_cache_ttl_secs", "Configured cache TTL.");

        // The TTL is fixed for the process lifetime; export it once.
        gauge!("enrich_cache_ttl_secs").set(cache_ttl_secs as f64);

        Self { handle }
    }

    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        )
    }
}
