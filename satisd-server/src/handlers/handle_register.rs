use axum::{
    extract::{Query, State, rejection::QueryRejection},
    response::Json,
};
use satisd_core::PackageUpdate;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::infra::{app_state::AppState, errors::AppResult};

#[derive(Debug, Default, Deserialize)]
pub struct RegisterQuery {
    pub package: Option<String>,
    pub version: Option<String>,
    pub repo: Option<String>,
    #[serde(rename = "repoType")]
    pub repo_type: Option<String>,
}

/// `GET|POST /register` - queue a package update for the next merge.
pub async fn register_handler(
    State(state): State<AppState>,
    query: Result<Query<RegisterQuery>, QueryRejection>,
) -> AppResult<Json<Value>> {
    let Query(query) = query?;
    let update = PackageUpdate::from_request(
        query.package,
        query.version,
        query.repo,
        query.repo_type,
    )?;

    info!(
        package = %update.name,
        version = %update.constraint,
        repo = %update.repository_url,
        repo_type = %update.repository_type,
        "package update registered"
    );
    state.pipeline.register(update);

    Ok(Json(json!({ "success": true })))
}
