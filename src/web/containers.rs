//! Managed instance endpoints.

use super::error::status_for;
use super::{ApiResult, AppState, ok_message};
use crate::container::{ContainerError, ContainerInfo, LaunchDefaults, LaunchOutcome, LaunchSpec};
use crate::env::runtime::DEFAULT_GROUP;
use crate::store::InstanceRecord;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;

pub(crate) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/containers", get(list_managed).post(launch))
        .route("/containers/all", get(list_all))
        .route("/containers/defaults", get(launch_defaults))
        .route("/containers/import", post(import_config))
        .route("/containers/:id", delete(delete_container))
        .route("/containers/:id/start", post(start))
        .route("/containers/:id/stop", post(stop))
        .route("/containers/:id/config", get(show_config))
        .route("/containers/:id/rebuild", get(rebuild_form).post(rebuild))
        .route("/containers/:id/logs", get(logs))
        .route("/containers/:id/logs/raw", get(logs_raw))
        .route("/containers/:id/logs/download", get(logs_download))
        .route("/containers/:id/copy", post(copy_within))
}

fn outcome_response(outcome: LaunchOutcome) -> (StatusCode, Json<LaunchOutcome>) {
    let status = match &outcome {
        LaunchOutcome::Launched { .. } => StatusCode::CREATED,
        LaunchOutcome::Failed { kind, .. } => status_for(*kind),
    };
    (status, Json(outcome))
}

async fn list_managed(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<ContainerInfo>>> {
    Ok(Json(state.orchestrator.list_managed().await?))
}

async fn list_all(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<ContainerInfo>>> {
    Ok(Json(state.orchestrator.list_all().await?))
}

async fn launch(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<LaunchSpec>,
) -> (StatusCode, Json<LaunchOutcome>) {
    outcome_response(state.orchestrator.launch_outcome(&spec).await)
}

#[derive(Debug, Deserialize)]
struct DefaultsQuery {
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    tag: Option<String>,
}

async fn launch_defaults(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DefaultsQuery>,
) -> Json<LaunchDefaults> {
    let group = query.group.unwrap_or_else(|| DEFAULT_GROUP.to_string());
    let tag = query.tag.unwrap_or_default();
    Json(state.orchestrator.launch_defaults(&group, &tag).await)
}

async fn import_config(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<LaunchOutcome>)> {
    if body.is_empty() {
        return Err(ContainerError::Validation("No file uploaded".to_string()).into());
    }
    let record = InstanceRecord::from_json(&body)?;
    let outcome = LaunchOutcome::from(state.orchestrator.import_config(&record).await);
    Ok(outcome_response(outcome))
}

async fn start(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    state.orchestrator.start(&id).await?;
    Ok(ok_message(format!("Container {} started.", id)))
}

async fn stop(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    state.orchestrator.stop(&id).await?;
    Ok(ok_message(format!("Container {} stopped.", id)))
}

async fn delete_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    state.orchestrator.delete(&id).await?;
    Ok(ok_message(format!("Container {} deleted.", id)))
}

/// Saved record with secrets masked.
async fn show_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<InstanceRecord>> {
    let mut record = state.orchestrator.rebuild_form(&id).await?;
    record.spec = record.spec.masked();
    Ok(Json(record))
}

async fn rebuild_form(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<InstanceRecord>> {
    Ok(Json(state.orchestrator.rebuild_form(&id).await?))
}

/// An empty body rebuilds from the saved record.
async fn rebuild(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<LaunchOutcome>)> {
    let spec = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(
            serde_json::from_slice::<LaunchSpec>(&body)
                .map_err(|e| ContainerError::Validation(format!("Invalid launch form: {}", e)))?,
        )
    };
    let outcome = LaunchOutcome::from(state.orchestrator.rebuild(&id, spec).await);
    Ok(outcome_response(outcome))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LogsQuery {
    #[serde(default)]
    pub full: bool,
}

async fn logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let logs = state.orchestrator.logs(&id, query.full).await?;
    Ok(Json(serde_json::json!({ "success": true, "logs": logs })))
}

async fn logs_raw(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<impl IntoResponse> {
    let logs = state.orchestrator.logs(&id, query.full).await?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], logs))
}

async fn logs_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let download = state.orchestrator.download_logs(&id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", download.file_name),
            ),
        ],
        download.content,
    ))
}

#[derive(Debug, Deserialize)]
struct CopyRequest {
    source: String,
    target: String,
}

async fn copy_within(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<CopyRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let message = state
        .orchestrator
        .copy_within(&id, &request.source, &request.target)
        .await?;
    Ok(ok_message(message))
}
