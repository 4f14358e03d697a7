// src/api/mod.rs — HTTP API for launching and observing meetings

pub mod auth;
pub mod handlers;
pub mod stream;
pub mod types;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::core::cost::CostAccountant;
use crate::core::executor::SequenceExecutor;
use crate::core::registry::RunRegistry;
use crate::broadcast::MoodBroadcaster;
use crate::infra::config::ApiConfig;
pub use types::MeetingRequest;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub executor: Arc<SequenceExecutor>,
    pub registry: Arc<RunRegistry>,
    pub broadcaster: Arc<MoodBroadcaster>,
    pub accountant: Arc<CostAccountant>,
    pub token: Option<String>,
}

/// Build the axum router with all API routes.
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/api/v1/meetings", post(handlers::create_meeting))
        .route("/api/v1/meetings", get(handlers::list_meetings))
        .route("/api/v1/meetings/{id}", get(handlers::get_meeting))
        .route("/api/v1/meetings/{id}/progress", get(handlers::get_progress))
        .route("/api/v1/meetings/{id}/steps", get(handlers::list_steps))
        .route("/api/v1/meetings/{id}/cancel", post(handlers::cancel_meeting))
        .route("/api/v1/meetings/{id}/moods", get(handlers::get_moods))
        .route("/api/v1/meetings/{id}/moods/stream", get(stream::stream_moods))
        .route("/api/v1/cost", get(handlers::get_cost))
        .route("/api/v1/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}

/// Start the API server on the configured port (blocking).
pub async fn start_server(config: &ApiConfig, state: ApiState) -> anyhow::Result<()> {
    let port = config.port;
    let addr = format!("127.0.0.1:{port}");

    let router = build_router(state);

    tracing::info!("API server listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
