use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    handlers::{
        config_file_handler, generate_handler, health_handler,
        register_handler,
    },
    infra::app_state::AppState,
};

/// Control endpoints plus the generated repository as the fallback.
pub fn create_app(state: AppState) -> Router {
    let repository = ServeDir::new(&state.output_path);

    Router::new()
        .route("/config.json", get(config_file_handler))
        .route("/generate", post(generate_handler))
        .route("/register", get(register_handler).post(register_handler))
        .route("/health", get(health_handler))
        .fallback_service(repository)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
