//! Auxiliary database containers.
//!
//! Helper databases are declared in the YAML catalog (see
//! [`crate::store::databases`]) and started by key. The catalog is re-read on
//! every call so edits apply without a restart.

use crate::container::logs;
use crate::container::{ContainerConfig, ContainerError, ContainerInfo, ContainerRuntime, Result};
use crate::env::runtime::DATABASE_NAME_PREFIX;
use crate::store::{DatabaseCatalog, DatabaseSpec};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Status shown for a catalog entry that has no container yet.
pub const NOT_CREATED: &str = "not created";

/// One catalog entry joined with its live container.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DatabaseStatus {
    /// Catalog key
    pub key: String,
    /// Display name (container name without the database prefix)
    pub name: String,
    /// Full container name, also its hostname on the shared network
    pub host: String,
    /// First host port, or `N/A`
    pub port: String,
    /// Runtime status or [`NOT_CREATED`]
    pub status: String,
    pub image: String,
}

/// Starts, stops and lists catalog databases.
pub struct AuxiliaryManager {
    runtime: Arc<dyn ContainerRuntime>,
    catalog_path: PathBuf,
    network: String,
}

impl AuxiliaryManager {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        catalog_path: impl Into<PathBuf>,
        network: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            catalog_path: catalog_path.into(),
            network: network.into(),
        }
    }

    async fn catalog(&self) -> Result<DatabaseCatalog> {
        DatabaseCatalog::load(&self.catalog_path).await
    }

    /// Every catalog entry with its container status.
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be read or containers cannot be listed.
    pub async fn list(&self) -> Result<Vec<DatabaseStatus>> {
        let catalog = self.catalog().await?;
        let containers: HashMap<String, ContainerInfo> = self
            .runtime
            .list_containers(true, None)
            .await?
            .into_iter()
            .map(|c| (c.name.clone(), c))
            .collect();

        Ok(catalog
            .iter()
            .map(|(key, spec)| DatabaseStatus {
                key: key.clone(),
                name: spec.name.replace(DATABASE_NAME_PREFIX, ""),
                host: spec.name.clone(),
                port: spec.first_host_port().unwrap_or("N/A").to_string(),
                status: containers
                    .get(&spec.name)
                    .map(|c| c.status.clone())
                    .unwrap_or_else(|| NOT_CREATED.to_string()),
                image: spec.image.clone(),
            })
            .collect())
    }

    /// Start the database `key`, creating its container if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NotFound`] for unknown keys and
    /// [`ContainerError::ImageUnavailable`] if the image cannot be pulled.
    pub async fn start(&self, key: &str) -> Result<String> {
        let catalog = self.catalog().await?;
        let spec = catalog
            .get(key)
            .ok_or_else(|| ContainerError::NotFound(format!("database {}", key)))?;
        self.start_spec(spec).await
    }

    /// Stop the database whose display name is `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NotFound`] if the container does not exist.
    pub async fn stop(&self, name: &str) -> Result<()> {
        self.runtime.stop_container(&container_name(name)).await
    }

    /// Cleaned logs of the database whose display name is `name`.
    pub async fn logs(&self, name: &str, tail: Option<usize>) -> Result<String> {
        logs::fetch(self.runtime.as_ref(), &container_name(name), tail).await
    }

    /// Create every `autostart` entry that has no container yet. Returns the
    /// names started; failures are logged and skipped.
    pub async fn autostart(&self) -> Vec<String> {
        let catalog = match self.catalog().await {
            Ok(catalog) => catalog,
            Err(e) => {
                error!("Cannot read database catalog {}: {}", self.catalog_path.display(), e);
                return Vec::new();
            }
        };

        info!("Starting default database containers...");
        let mut started = Vec::new();
        for (key, spec) in catalog.autostart_entries() {
            match self.runtime.container_exists(&spec.name).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    error!("Error checking {}: {}", spec.name, e);
                    continue;
                }
            }

            match self.create(spec).await {
                Ok(_) => {
                    info!("Started container: {}", spec.name);
                    started.push(spec.name.clone());
                }
                Err(e) => error!("Error starting {} ({}): {}", spec.name, key, e),
            }
        }
        started
    }

    async fn start_spec(&self, spec: &DatabaseSpec) -> Result<String> {
        self.ensure_image(&spec.image).await?;

        if self.runtime.container_exists(&spec.name).await? {
            self.runtime.start_container(&spec.name).await?;
            let info = self.runtime.inspect_container(&spec.name).await?;
            info!("Started existing database {}", spec.name);
            return Ok(info.id);
        }
        self.create(spec).await
    }

    async fn create(&self, spec: &DatabaseSpec) -> Result<String> {
        self.ensure_image(&spec.image).await?;
        self.runtime.ensure_network(&self.network).await?;
        let config = database_config(spec, &self.network)?;
        self.runtime.create_and_start(&spec.name, &config).await
    }

    async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.runtime.image_exists(image).await? {
            return Ok(());
        }
        info!("Image {} not found - pulling...", image);
        self.runtime
            .pull_image(image)
            .await
            .map_err(|e| ContainerError::ImageUnavailable {
                image: image.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Container name for a database display name.
pub fn container_name(name: &str) -> String {
    format!("{}{}", DATABASE_NAME_PREFIX, name)
}

fn database_config(spec: &DatabaseSpec, network: &str) -> Result<ContainerConfig> {
    let mut builder = ContainerConfig::builder()
        .image(&spec.image)
        .network_mode(network)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    if let Some(command) = &spec.command {
        builder = builder.cmd(command.split_whitespace());
    }

    for (container_port, host_port) in &spec.ports {
        let host_port = host_port.parse::<u16>().map_err(|_| {
            ContainerError::Validation(format!(
                "Invalid host port '{}' for {}",
                host_port, spec.name
            ))
        })?;
        builder = builder.port_binding(container_port.as_str(), host_port);
    }

    builder.build()
}
