use axum::{extract::State, response::Json};
use serde_json::{Value, json};

use crate::infra::app_state::AppState;

/// `GET /health` - liveness plus a snapshot of the pipeline.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "pipeline": state.pipeline.status(),
    }))
}
