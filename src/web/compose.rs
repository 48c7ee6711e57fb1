//! Compose group endpoints.

use super::{ApiResult, AppState, ok_message};
use crate::container::{ContainerError, GroupListing, GroupMetadata};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;

pub(crate) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/compose", get(list).post(import))
        .route("/compose/:group", get(metadata).delete(delete))
        .route("/compose/:group/start", post(start))
        .route("/compose/:group/stop", post(stop))
        .route("/compose/:group/rebuild", post(rebuild))
}

async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<GroupListing>>> {
    Ok(Json(state.compose.list().await?))
}

#[derive(Debug, Deserialize)]
struct ImportQuery {
    group: String,
}

/// The request body is the manifest itself.
async fn import(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ImportQuery>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<GroupMetadata>)> {
    if body.is_empty() {
        return Err(ContainerError::Validation("No file uploaded".to_string()).into());
    }
    let metadata = state.compose.import(query.group.trim(), &body).await?;
    Ok((StatusCode::CREATED, Json(metadata)))
}

async fn metadata(
    State(state): State<Arc<AppState>>,
    Path(group): Path<String>,
) -> ApiResult<Json<GroupMetadata>> {
    Ok(Json(state.compose.metadata(&group).await?))
}

async fn start(
    State(state): State<Arc<AppState>>,
    Path(group): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    state.compose.start(&group).await?;
    Ok(ok_message(format!("Group '{}' started.", group)))
}

async fn stop(
    State(state): State<Arc<AppState>>,
    Path(group): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    state.compose.stop(&group).await?;
    Ok(ok_message(format!("Group '{}' stopped.", group)))
}

async fn rebuild(
    State(state): State<Arc<AppState>>,
    Path(group): Path<String>,
) -> ApiResult<Json<GroupMetadata>> {
    Ok(Json(state.compose.rebuild(&group).await?))
}

async fn delete(
    State(state): State<Arc<AppState>>,
    Path(group): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    state.compose.delete(&group).await?;
    Ok(ok_message(format!("Group '{}' deleted.", group)))
}
