//! Image endpoints.

use super::{ApiResult, AppState, ok_message};
use crate::container::{ContainerError, ImageInfo, validate_archive_name};
use axum::body::Body;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

pub(crate) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/images", get(list_images))
        .route("/images/pull", post(pull_image))
        .route("/images/remove", post(remove_image))
        .route("/images/import", post(import_image))
}

async fn list_images(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<ImageInfo>>> {
    Ok(Json(state.runtime().list_images().await?))
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    image: String,
}

async fn pull_image(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PullRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let image = request.image.trim();
    if image.is_empty() {
        return Err(ContainerError::Validation("Image is required".to_string()).into());
    }
    state
        .runtime()
        .pull_image(image)
        .await
        .map_err(|e| ContainerError::ImageUnavailable {
            image: image.to_string(),
            reason: e.to_string(),
        })?;
    Ok(ok_message(format!("Image '{}' pulled successfully.", image)))
}

#[derive(Debug, Deserialize)]
struct RemoveRequest {
    image: String,
    #[serde(default)]
    force: bool,
}

async fn remove_image(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RemoveRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .runtime()
        .remove_image(&request.image, request.force)
        .await?;
    Ok(ok_message(format!("Image '{}' deleted.", request.image)))
}

#[derive(Debug, Deserialize)]
struct ImportQuery {
    filename: String,
}

/// Streams the raw upload into a temporary file; the body is never held whole.
async fn import_image(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ImportQuery>,
    body: Body,
) -> ApiResult<Json<serde_json::Value>> {
    validate_archive_name(&query.filename)?;
    let (spool, size) = spool_upload(body).await?;
    if size == 0 {
        return Err(ContainerError::Validation("No file uploaded".to_string()).into());
    }

    info!("Importing image archive {} ({} bytes)", query.filename, size);
    let lines = state
        .runtime()
        .load_image(&query.filename, spool.path())
        .await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("Image '{}' imported successfully.", query.filename),
        "output": lines,
    })))
}

async fn spool_upload(body: Body) -> Result<(NamedTempFile, u64), ContainerError> {
    let spool = tempfile::Builder::new()
        .prefix("dockpanel-upload-")
        .tempfile()?;
    let mut file = tokio::fs::File::from_std(spool.as_file().try_clone()?);

    let mut written = 0u64;
    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|e| ContainerError::Validation(format!("Upload interrupted: {}", e)))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    debug!("Spooled {} bytes to {}", written, spool.path().display());
    Ok((spool, written))
}
