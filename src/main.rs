//! Article Enricher — Binary Entrypoint
//! Boots the Axum HTTP server, wiring routes, shared state, and middleware.
//!
//! Startup order matters: dotenv first so the config loader sees overrides,
//! tracing next so construction is observable, then every engine is built
//! once up front — no model or lexicon loads lazily on the first request.

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use article_enricher::config::EnrichConfig;
use article_enricher::metrics::Metrics;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("article_enricher=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = EnrichConfig::load();
    info!(
        bind = %config.bind,
        cache_capacity = config.cache.capacity,
        cache_ttl_secs = config.cache.ttl_secs,
        "starting article enricher"
    );

    let metrics = Metrics::init(config.cache.ttl_secs);
    let bind = config.bind.clone();

    let state = article_enricher::build_state(config);
    let app = article_enricher::router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(addr = %bind, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
