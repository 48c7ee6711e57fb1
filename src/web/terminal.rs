//! WebSocket terminal.
//!
//! Browser keystrokes arrive as text or binary frames and are written to the
//! shell; shell output goes back as text frames.

use super::{ApiResult, AppState};
use crate::container::ContainerError;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse, Response};
use futures::{SinkExt, StreamExt, future};
use std::sync::Arc;
use tracing::{error, info};

/// Resolve the container, then upgrade.
pub(crate) async fn terminal_ws(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let container = state.runtime().inspect_container(&id).await?;
    Ok(ws.on_upgrade(move |socket| run_session(state, container.id, socket)))
}

async fn run_session(state: Arc<AppState>, container_id: String, socket: WebSocket) {
    let (sink, stream) = socket.split();

    let client_rx = stream
        .take_while(|msg| future::ready(matches!(msg, Ok(m) if !matches!(m, Message::Close(_)))))
        .filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(text.into_bytes()),
                Ok(Message::Binary(data)) => Some(data),
                _ => None,
            })
        });
    let client_tx =
        sink.with(|text: String| future::ready(Ok::<_, axum::Error>(Message::Text(text))));

    match state.terminal.attach(&container_id, client_rx, client_tx).await {
        Ok(end) => info!("Terminal for {} closed: {:?}", container_id, end),
        Err(e) => error!("Failed to open terminal for {}: {}", container_id, e),
    }
}

/// Minimal page wiring a text area to `/ws/terminal/:id`.
pub(crate) async fn terminal_page(Path(id): Path<String>) -> ApiResult<impl IntoResponse> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || "-_.".contains(c)) {
        return Err(ContainerError::Validation(format!("Invalid container id '{}'", id)).into());
    }
    Ok(Html(TERMINAL_PAGE.replace("{{CONTAINER}}", &id)))
}

const TERMINAL_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Terminal - {{CONTAINER}}</title>
<style>
body { margin: 0; background: #111; color: #ddd; font-family: monospace; }
#out { white-space: pre-wrap; padding: 8px; height: calc(100vh - 48px); overflow-y: auto; }
#in { width: 100%; box-sizing: border-box; background: #222; color: #ddd; border: 0; padding: 8px; font-family: monospace; }
</style>
</head>
<body>
<div id="out"></div>
<input id="in" autofocus placeholder="command">
<script>
const out = document.getElementById("out");
const input = document.getElementById("in");
const scheme = location.protocol === "https:" ? "wss://" : "ws://";
const ws = new WebSocket(scheme + location.host + "/ws/terminal/{{CONTAINER}}");
const strip = s => s.replace(/\x1b\[[0-?]*[ -\/]*[@-~]/g, "");
ws.onmessage = e => { out.textContent += strip(e.data); out.scrollTop = out.scrollHeight; };
ws.onclose = () => { out.textContent += "\n[session closed]\n"; input.disabled = true; };
input.addEventListener("keydown", e => {
  if (e.key === "Enter") { ws.send(input.value + "\n"); input.value = ""; }
});
</script>
</body>
</html>
"#;
