//! HTTP boundary for the illustration engine: one generation endpoint
//! plus a liveness probe. All internal failures degrade to a null
//! image payload; the endpoint itself never surfaces a protocol error
//! for a reachable request.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use storyframe_contracts::payload::{GenerateRequest, GenerateResponse};
use storyframe_engine::IllustrationEngine;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<IllustrationEngine>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(liveness_handler))
        .route("/generate-image", post(generate_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

async fn liveness_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Runs the blocking cascade off the async runtime. A join failure is
/// the one path with no better answer than an explicit null.
async fn generate_handler(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Json<GenerateResponse> {
    let request_id = Uuid::new_v4();
    let engine = Arc::clone(&state.engine);
    let prompt = request.prompt;

    let span = tracing::info_span!("generate_image", %request_id);
    let response = tokio::task::spawn_blocking(move || {
        let _guard = span.enter();
        engine.generate(&prompt)
    })
    .await
        .unwrap_or_else(|err| {
            tracing::error!(%request_id, error = %err, "generation task failed");
            GenerateResponse::empty()
        });

    Json(response)
}
