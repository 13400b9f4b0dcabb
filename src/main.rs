use searchsync::{
    api::{build_router, AppState},
    config::Config,
    feed::{ChangeRouter, HttpChangeFeed},
    search::ElasticClient,
};
use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "searchsync={},tower_http=info",
            config.observability.log_level
        )
        .into()
    });
    if config.observability.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Refuse to serve with incomplete configuration.
    config.validate().context("Invalid configuration")?;

    tracing::info!("Starting searchsync v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(index = %config.elasticsearch.index, engine = %config.elasticsearch.url, "Search engine");

    let elastic = Arc::new(
        ElasticClient::new(&config.elasticsearch).context("Failed to create search client")?,
    );

    // Change feed -> router pipeline.
    let (events_tx, events_rx) = tokio::sync::mpsc::channel(1024);
    let feed = HttpChangeFeed::new(&config.feed).context("Failed to create feed source")?;
    tokio::spawn(async move { feed.run(events_tx).await });
    tracing::info!(feed = %config.feed.url, "Change feed tail started");

    let router = ChangeRouter::new(
        Arc::clone(&elastic),
        config.indexing.throttle_delay(),
        config.indexing.index_permissionless_documents,
    );
    let pipeline_handle = tokio::spawn(async move { router.run(events_rx).await });

    // HTTP search API.
    let app = build_router(AppState::new(Arc::clone(&elastic)));
    let http_addr = format!("{}:{}", config.server.host, config.server.port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", http_addr))?;

    tracing::info!("HTTP search API listening on http://{}", http_addr);

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, app).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
        _ = pipeline_handle => {
            tracing::warn!("Indexing pipeline stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("Shutting down gracefully...");
    Ok(())
}
