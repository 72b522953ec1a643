//! sublinks-federation binary entry point

use std::sync::Arc;

use sublinks_federation::config;
use sublinks_federation::data::Database;
use sublinks_federation::queue::{Consumer, Dispatcher};
use sublinks_federation::AppState;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Initialize tracing/logging
/// 2. Load configuration (.env, files, environment)
/// 3. Connect to SQLite and run migrations
/// 4. Connect to the broker, declare/bind, subscribe
/// 5. Spawn the queue consumer
/// 6. Serve HTTP until Ctrl-C
///
/// Any failure before step 6 exits without serving.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize tracing/logging
    let log_format =
        std::env::var("SUBLINKS__LOGGING__FORMAT").unwrap_or_else(|_| "pretty".to_string());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "sublinks_federation=info,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "sublinks_federation=info,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting sublinks-federation...");

    sublinks_federation::metrics::init_metrics();

    // 2. Load configuration
    let config = config::AppConfig::load()?;
    tracing::info!(
        domain = %config.server.domain,
        exchange = %config.queue.exchange,
        queue = %config.queue.queue_name,
        "Configuration loaded"
    );

    // 3. Database
    let db = Database::connect_and_migrate(&config.database.path, config.database.max_connections)
        .await?;
    let repository = Arc::new(db.clone());

    // 4-5. Queue consumer
    let shutdown = CancellationToken::new();
    let dispatcher = Arc::new(Dispatcher::new(
        repository.clone(),
        config.queue.processing_timeout(),
        config.queue.unroutable,
    ));
    let consumer = Consumer::new(config.queue.clone(), dispatcher, shutdown.clone())
        .start()
        .await?;

    // 6. HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);
    tracing::info!("Public URL: {}", config.server.base_url());

    let app = sublinks_federation::build_router(AppState::new(config, repository));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // Consumer finishes its in-flight message, then closes the broker connection
    shutdown.cancel();
    if let Err(e) = consumer.await {
        tracing::error!(error = %e, "Queue consumer task failed");
    }
    db.close().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolve on Ctrl-C, cancelling the consumer
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        shutdown.cancelled().await;
        return;
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
