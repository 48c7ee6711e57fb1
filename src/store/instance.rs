//! Per-instance launch configuration records.
//!
//! One pretty-printed JSON file per instance (`<name>-config.json`) holding the
//! full [`LaunchSpec`]. Records are written through a temporary file and a
//! rename so a crash never leaves a truncated record behind.

use crate::container::{ContainerError, LaunchSpec, Result};
use crate::env::layout::CONFIG_RECORD_SUFFIX;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tracing::{debug, info};

/// Persisted launch configuration of one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    #[serde(flatten)]
    pub spec: LaunchSpec,
    /// When the record was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl InstanceRecord {
    /// Wrap a spec as a freshly saved record.
    pub fn new(spec: LaunchSpec) -> Self {
        Self {
            spec,
            saved_at: Some(Utc::now()),
        }
    }

    /// Parse a record from uploaded JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Validation`] if the document is not a record.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| ContainerError::Validation(format!("Invalid configuration file: {}", e)))
    }
}

/// Directory of instance records.
#[derive(Debug, Clone)]
pub struct InstanceStore {
    dir: PathBuf,
}

impl InstanceStore {
    /// Store rooted at `dir`; the directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record path for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Validation`] for names that would escape the directory.
    pub fn record_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ContainerError::Validation(format!(
                "Invalid instance name: '{}'",
                name
            )));
        }
        Ok(self.dir.join(format!("{}{}", name, CONFIG_RECORD_SUFFIX)))
    }

    /// Write the record for `spec.container_name`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns error if the name is invalid or the file cannot be written.
    pub async fn save(&self, spec: &LaunchSpec) -> Result<PathBuf> {
        let path = self.record_path(&spec.container_name)?;
        async_fs::create_dir_all(&self.dir).await?;

        let record = InstanceRecord::new(spec.clone());
        let data = serde_json::to_vec_pretty(&record)?;

        let temp = path.with_extension("json.tmp");
        async_fs::write(&temp, &data).await?;
        async_fs::rename(&temp, &path).await?;

        info!("Saved configuration for {} to {}", spec.container_name, path.display());
        Ok(path)
    }

    /// Load the record for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NotFound`] if there is no record.
    pub async fn load(&self, name: &str) -> Result<InstanceRecord> {
        let path = self.record_path(name)?;
        let data = match async_fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ContainerError::NotFound(format!(
                    "Config file not found for container {}",
                    name
                )));
            }
            Err(e) => return Err(e.into()),
        };
        debug!("Loaded configuration from {}", path.display());
        Ok(serde_json::from_slice(&data)?)
    }

    /// Remove the record for `name`. Returns whether a record existed.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be removed.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        let path = self.record_path(name)?;
        match async_fs::remove_file(&path).await {
            Ok(()) => {
                info!("Removed configuration {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
