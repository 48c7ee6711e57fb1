//! HTTP presentation layer.
//!
//! A JSON API under `/api` over the lifecycle, compose and database managers,
//! plus the WebSocket terminal. Handlers translate core errors into status
//! codes through [`error::ApiError`]; all state lives in [`AppState`].

pub mod compose;
pub mod containers;
pub mod databases;
pub mod error;
pub mod images;
pub mod terminal;

use crate::container::{
    AuxiliaryManager, ComposeGroupManager, ContainerRuntime, LifecycleConfig, LifecycleOrchestrator,
    TerminalRelay,
};
use crate::env;
use crate::store::{InstanceStore, parse_tag_file};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::{ApiError, ApiResult};

/// Shared handler state.
pub struct AppState {
    pub orchestrator: LifecycleOrchestrator,
    pub compose: ComposeGroupManager,
    pub auxiliary: AuxiliaryManager,
    pub terminal: TerminalRelay,
    pub data_root: PathBuf,
}

impl AppState {
    /// Build every manager over one runtime handle.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: LifecycleConfig) -> Self {
        let data_root = config.data_root.clone();
        let store = InstanceStore::new(env::config_records_dir_path(&data_root));
        Self {
            compose: ComposeGroupManager::new(runtime.clone(), &data_root),
            auxiliary: AuxiliaryManager::new(
                runtime.clone(),
                env::databases_file_path(&data_root),
                config.network.clone(),
            ),
            terminal: TerminalRelay::new(runtime.clone()),
            orchestrator: LifecycleOrchestrator::new(runtime, store, config),
            data_root,
        }
    }

    pub fn runtime(&self) -> &Arc<dyn ContainerRuntime> {
        self.orchestrator.runtime()
    }

    /// Tail length for non-full log requests.
    pub fn log_tail(&self, full: bool) -> Option<usize> {
        (!full).then_some(self.orchestrator.config().log_tail)
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/tags", get(home_tags))
        .merge(images::routes())
        .merge(containers::routes())
        .merge(databases::routes())
        .merge(compose::routes());

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api)
        .route("/ws/terminal/:id", get(terminal::terminal_ws))
        .route("/containers/:id/terminal", get(terminal::terminal_page))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the panel until the listener fails.
///
/// # Errors
///
/// Returns error if the address cannot be bound or the server stops.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Panel listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Image tags offered on the launch form.
#[derive(Debug, Serialize)]
pub struct HomeTags {
    pub platform: Vec<String>,
    pub manager: Vec<String>,
}

async fn home_tags(State(state): State<Arc<AppState>>) -> Json<HomeTags> {
    let platform = parse_tag_file(&state.data_root.join(env::layout::PLATFORM_TAGS_FILE)).await;
    let manager = parse_tag_file(&state.data_root.join(env::layout::MANAGER_TAGS_FILE)).await;
    Json(HomeTags { platform, manager })
}

/// `{"success": true, "message": ...}`
pub(crate) fn ok_message(message: impl Into<String>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "message": message.into(),
    }))
}
