use axum::{extract::State, response::Json};
use serde_json::{Value, json};
use tracing::info;

use crate::infra::app_state::AppState;

/// `POST /generate` - request a rebuild of the current document.
pub async fn generate_handler(State(state): State<AppState>) -> Json<Value> {
    info!("HTTP triggered repo generation");
    state.pipeline.request_rebuild();

    Json(json!({ "success": true }))
}
