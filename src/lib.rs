//! # Dockpanel
//!
//! A web control panel over a single Docker host. It launches platform
//! containers from a launch specification, rebuilds them from saved
//! configuration records, relays interactive terminals, manages compose groups
//! and starts helper database containers.
//!
//! ## Architecture Overview
//!
//! - **[`container`]**: Everything that talks to the container runtime, behind
//!   the [`container::ContainerRuntime`] seam
//! - **[`store`]**: Configuration records, the database catalog and tag listings
//! - **[`web`]**: axum JSON API and WebSocket terminal
//! - **[`cli`]**: Command line arguments and configuration discovery
//! - **[`env`]**: Fixed names and on-disk layout
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dockpanel::container::{DockerRuntime, DockerRuntimeConfig, LifecycleConfig};
//! use dockpanel::web::{self, AppState};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = Arc::new(DockerRuntime::connect(DockerRuntimeConfig::default()).await?);
//!     let state = Arc::new(AppState::new(runtime, LifecycleConfig::default()));
//!     web::serve("127.0.0.1:8000".parse()?, state).await
//! }
//! ```

/// Runtime client adapter and the managers built on it.
///
/// Lifecycle orchestration, terminal relay, compose groups and auxiliary
/// databases all go through one injected [`container::ContainerRuntime`].
pub mod container;

/// On-disk configuration store.
pub mod store;

/// HTTP presentation layer.
pub mod web;

/// Command line interface.
pub mod cli;

/// Fixed names and path builders.
pub mod env;
