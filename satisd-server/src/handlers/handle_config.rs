use axum::{
    extract::{Request, State},
    response::{IntoResponse, Response},
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::infra::app_state::AppState;

/// `GET /config.json` - the persisted configuration document as a static
/// file. The file is opened under the document read guard; rewrites replace
/// it by rename, so the opened handle always holds a complete document.
pub async fn config_file_handler(
    State(state): State<AppState>,
    request: Request,
) -> Response {
    let _guard = state.pipeline.document().read().await;

    match ServeFile::new(state.config_path()).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}
