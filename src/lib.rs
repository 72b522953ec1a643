//! sublinks-federation - ActivityPub federation node for Sublinks
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   routing key    ┌────────────┐   upsert   ┌────────────┐
//! │ AMQP broker  │ ───────────────▶ │ Dispatcher │ ─────────▶ │ Repository │
//! │ (lapin)      │ ◀─── Ack/Nack ── │ + Workers  │            │ (SQLite)   │
//! └──────────────┘                  └────────────┘            └────────────┘
//!                                                                   │
//! ┌──────────────┐   GET /post/:id  ┌────────────┐     read         │
//! │ Remote peers │ ───────────────▶ │ Axum API   │ ◀────────────────┘
//! └──────────────┘ ◀── AS2 JSON ─── │ + convert  │
//!                                   └────────────┘
//! ```
//!
//! # Modules
//!
//! - `queue`: broker client, consumer loop, dispatcher, routing table
//! - `worker`: per-entity decode/validate/upsert
//! - `activitypub`: entity → ActivityPub conversion and IRIs
//! - `api`: HTTP handlers
//! - `data`: SQLite repository
//! - `config`: Configuration management
//! - `error`: Error types

pub mod activitypub;
pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod worker;

use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Entity storage, shared with the queue workers
    pub repository: Arc<dyn data::Repository>,
}

impl AppState {
    pub fn new(config: config::AppConfig, repository: Arc<dyn data::Repository>) -> Self {
        Self {
            config: Arc::new(config),
            repository,
        }
    }
}

/// Build the Axum router
///
/// Routes:
/// - GET /health
/// - GET /post/:post_id
/// - GET /metrics
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::post_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

/// Remote instances fetch objects cross-origin; restrict to our own origin
/// once served over https.
fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if !server.protocol.eq_ignore_ascii_case("https") {
        return CorsLayer::permissive();
    }

    let allowed_origin = server.base_url();
    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from server base URL; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
