//! Auxiliary database endpoints.

use super::containers::LogsQuery;
use super::{ApiResult, AppState, ok_message};
use crate::container::DatabaseStatus;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;

pub(crate) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/databases", get(list))
        .route("/databases/:name/start", post(start))
        .route("/databases/:name/stop", post(stop))
        .route("/databases/:name/logs", get(logs))
}

async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<DatabaseStatus>>> {
    Ok(Json(state.auxiliary.list().await?))
}

async fn start(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    state.auxiliary.start(&key).await?;
    Ok(ok_message(format!("Database {} started.", key)))
}

async fn stop(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    state.auxiliary.stop(&name).await?;
    Ok(ok_message(format!("Database {} stopped.", name)))
}

async fn logs(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let logs = state.auxiliary.logs(&name, state.log_tail(query.full)).await?;
    Ok(Json(serde_json::json!({ "success": true, "logs": logs })))
}

#[cfg(test)]
mod tests {
    use crate::web::test_support::app;
    use axum::http::StatusCode;

    const CATALOG: &str = "redis:\n  name: denodo-db-redis\n  image: redis:7\n  ports:\n    6379: 16379\n";

    #[tokio::test]
    async fn test_start_and_list() {
        let app = app();
        let databases = app.dir.path().join("databases");
        std::fs::create_dir_all(&databases).unwrap();
        std::fs::write(databases.join("databases.yaml"), CATALOG).unwrap();

        let (status, body) = app.get("/api/databases").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["status"], "not created");

        let (status, _) = app.post_raw("/api/databases/redis/start", "").await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = app.get("/api/databases").await;
        assert_eq!(body[0]["status"], "running");
        assert_eq!(body[0]["port"], "16379");

        let (status, _) = app.post_raw("/api/databases/redis/stop", "").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_catalog_is_not_found() {
        let app = app();
        let (status, _) = app.get("/api/databases").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
