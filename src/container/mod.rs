//! Container orchestration layer.
//!
//! This module owns every interaction with the container runtime: the bollard
//! client adapter, launch specification parsing, the lifecycle orchestrator
//! that turns a launch request into a running instance, the terminal relay
//! bridging a browser to an in-container shell, compose group management and
//! the auxiliary database instances.
//!
//! ## Architecture
//!
//! - [`client`]: Docker API connection management
//! - [`runtime`]: The [`ContainerRuntime`] seam and its bollard implementation
//! - [`config`]: Container create configuration builder
//! - [`executor`]: Command execution within running containers
//! - [`image`]: Image listing, pulling, removal and archive loading
//! - [`network`]: Shared bridge network get-or-create
//! - [`path`]: Host path translation for bind mounts
//! - [`spec`]: Launch specification types and parsing
//! - [`lifecycle`]: Launch, rebuild, delete and inspection of instances
//! - [`terminal`]: Bidirectional relay for interactive shells
//! - [`compose`]: Compose group import and lifecycle
//! - [`auxiliary`]: Catalog-driven auxiliary database containers
//! - [`logs`]: Log retrieval helpers
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dockpanel::container::{DockerRuntime, LifecycleConfig, LifecycleOrchestrator, LaunchSpec};
//! use dockpanel::store::InstanceStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = Arc::new(DockerRuntime::connect(Default::default()).await?);
//!     let store = InstanceStore::new("denodo-container-configuration");
//!     let orchestrator = LifecycleOrchestrator::new(runtime, store, LifecycleConfig::default());
//!
//!     let spec = LaunchSpec {
//!         tag: "9.1.0".into(),
//!         group: "denodo_platform".into(),
//!         container_name: "vdp1".into(),
//!         hostname: "vdp1".into(),
//!         volumes: vec![],
//!         ports: vec!["9999:9999".into()],
//!         env_vars: vec![],
//!         command: "--vdpserver".into(),
//!     };
//!
//!     let id = orchestrator.launch(&spec).await?;
//!     println!("launched {}", id);
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod executor;
mod image;
mod network;
mod runtime;

pub mod auxiliary;
pub mod compose;
pub mod lifecycle;
pub mod logs;
pub mod path;
pub mod spec;
pub mod terminal;

#[cfg(test)]
pub(crate) mod testing;

pub use auxiliary::{AuxiliaryManager, DatabaseStatus};
pub use client::{ContainerClient, ContainerClientConfig};
pub use compose::{ComposeGroupManager, GroupListing, GroupMetadata};
pub use config::{ContainerConfig, ContainerConfigBuilder};
pub use executor::{ExecConfig, ExecOutput};
pub use image::{ImageInfo, ImageManager, ProgressLine, validate_archive_name};
pub use lifecycle::{LaunchDefaults, LaunchOutcome, LifecycleConfig, LifecycleOrchestrator};
pub use network::NetworkManager;
pub use path::PathTranslator;
pub use runtime::{
    ContainerInfo, ContainerRuntime, DockerRuntime, DockerRuntimeConfig, ShellChannel,
};
pub use spec::{EnvAssignment, ImageCategory, LaunchSpec, PortMapping, VolumeMapping};
pub use terminal::{RelayEnd, TerminalRelay};

/// Coarse classification of a [`ContainerError`].
///
/// The presentation layer maps kinds to user-facing status codes, keeping the
/// core free of transport concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    ImageUnavailable,
    Provisioning,
    RuntimeUnreachable,
    NotFound,
    DuplicateGroup,
    InvalidManifest,
    Runtime,
    Io,
}

/// Container runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// Malformed user input (port, volume, env or name syntax)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Image missing locally and the pull failed
    #[error("Image unavailable: {image}: {reason}")]
    ImageUnavailable { image: String, reason: String },

    /// Post-start in-container setup failed; the container keeps running
    #[error("Provisioning error: {0}")]
    Provisioning(String),

    /// The runtime endpoint could not be reached
    #[error("Container runtime unreachable: {0}")]
    RuntimeUnreachable(String),

    /// Container, record or group not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A compose group directory with that name already exists
    #[error("Group already exists: {0}")]
    DuplicateGroup(String),

    /// Compose manifest rejected by the runtime's config check
    #[error("Invalid compose manifest: {0}")]
    InvalidManifest(String),

    /// Docker API error
    #[error("Docker API error: {0}")]
    Api(#[from] bollard::errors::Error),

    /// Command execution error
    #[error("Execution error: {0}")]
    Execution(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON record error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML manifest error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ContainerError {
    /// Classify the error for presentation.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContainerError::Validation(_) => ErrorKind::Validation,
            ContainerError::ImageUnavailable { .. } => ErrorKind::ImageUnavailable,
            ContainerError::Provisioning(_) => ErrorKind::Provisioning,
            ContainerError::RuntimeUnreachable(_) => ErrorKind::RuntimeUnreachable,
            ContainerError::NotFound(_) => ErrorKind::NotFound,
            ContainerError::DuplicateGroup(_) => ErrorKind::DuplicateGroup,
            ContainerError::InvalidManifest(_) => ErrorKind::InvalidManifest,
            ContainerError::Api(bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                ..
            }) => ErrorKind::NotFound,
            ContainerError::Api(_) | ContainerError::Execution(_) => ErrorKind::Runtime,
            ContainerError::Io(_) | ContainerError::Json(_) | ContainerError::Yaml(_) => {
                ErrorKind::Io
            }
        }
    }

    /// Turn a bollard 404 into [`ContainerError::NotFound`] for `what`.
    pub(crate) fn from_api(what: &str, error: bollard::errors::Error) -> Self {
        match error {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            } => ContainerError::NotFound(what.to_string()),
            e => ContainerError::Api(e),
        }
    }
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;
