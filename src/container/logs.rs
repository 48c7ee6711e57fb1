//! Container log retrieval.
//!
//! Logs are fetched as combined stdout/stderr and cleaned of terminal escape
//! sequences before display.

use crate::container::{ContainerRuntime, Result};
use regex::Regex;
use std::sync::LazyLock;

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("static regex should not panic")
});

/// Remove ANSI escape sequences.
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

/// A log snapshot ready to be served as a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDownload {
    pub file_name: String,
    pub content: String,
}

/// Download file name for a container's log.
pub fn download_file_name(container_name: &str) -> String {
    format!("{}_logs.txt", container_name)
}

/// Fetch cleaned logs, the last `tail` lines or everything.
///
/// # Errors
///
/// Returns error if the container does not exist or the runtime fails.
pub async fn fetch(
    runtime: &dyn ContainerRuntime,
    id: &str,
    tail: Option<usize>,
) -> Result<String> {
    let raw = runtime.logs(id, tail).await?;
    Ok(strip_ansi(&raw))
}

/// Fetch the full cleaned log of a container with its download file name.
///
/// # Errors
///
/// Returns error if the container does not exist or the runtime fails.
pub async fn download(runtime: &dyn ContainerRuntime, id: &str) -> Result<LogDownload> {
    let info = runtime.inspect_container(id).await?;
    let content = fetch(runtime, &info.id, None).await?;
    Ok(LogDownload {
        file_name: download_file_name(&info.name),
        content,
    })
}
