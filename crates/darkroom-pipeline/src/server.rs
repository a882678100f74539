//! HTTP inbound for the pipeline
//!
//! Receives raw blob-store notification payloads and attribute-change
//! requests, and exposes health and Prometheus metrics endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use darkroom_core::types::{AttributeUpdate, PipelineEvent};
use darkroom_core::{DarkroomConfig, Result};

use crate::metrics::MetricsRecorder;
use crate::pipeline::Pipeline;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub metrics: Arc<MetricsRecorder>,
}

/// Pipeline HTTP server
pub struct PipelineServer {
    config: DarkroomConfig,
}

impl PipelineServer {
    pub fn new(config: DarkroomConfig) -> Self {
        Self { config }
    }

    pub async fn run(self, pipeline: Arc<Pipeline>, metrics: Arc<MetricsRecorder>) -> Result<()> {
        let state = AppState { pipeline, metrics };

        let app = Router::new()
            .route("/events", post(ingest_events))
            .route("/attributes", post(ingest_attribute))
            .route("/healthz", get(healthz))
            .route("/metrics", get(metrics_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let addr = format!(
            "{}:{}",
            self.config.server.bind_address, self.config.server.port
        );
        let listener = TcpListener::bind(&addr).await?;

        info!("🚀 Darkroom pipeline listening on http://{}", addr);
        info!("📈 Prometheus metrics at http://{}/metrics", addr);

        axum::serve(listener, app).await?;
        Ok(())
    }
}

/// Accept a raw notification payload, however wrapped
async fn ingest_events(State(state): State<AppState>, body: String) -> Response {
    match state.pipeline.ingest_raw(&body).await {
        Ok(published) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "published": published })),
        )
            .into_response(),
        Err(e) => {
            // Terminal: a malformed payload can never become valid, so it
            // is logged and dropped rather than retried.
            warn!("dropped malformed notification payload: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": e.reason(),
                    "message": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

/// Accept an attribute-change request
async fn ingest_attribute(
    State(state): State<AppState>,
    Json(update): Json<AttributeUpdate>,
) -> Response {
    state
        .pipeline
        .publish(PipelineEvent::Attribute(update))
        .await;
    StatusCode::ACCEPTED.into_response()
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render(),
    )
}
