//! Docker API client wrapper.
//!
//! Provides a simplified interface to the bollard Docker API with endpoint
//! selection, fallback strategies, and health checking. One client is built at
//! startup and shared by every request.

use crate::container::{ContainerError, Result};
use bollard::Docker;
use std::sync::Arc;
use tracing::{debug, info};

/// Container client configuration.
#[derive(Debug, Clone)]
pub struct ContainerClientConfig {
    /// Explicit endpoint (`unix:///...`, `tcp://host:port`, `http://...`).
    /// Local defaults are used when unset.
    pub endpoint: Option<String>,
    /// Request timeout in seconds
    pub timeout: u64,
}

impl Default for ContainerClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout: 120,
        }
    }
}

/// Docker API client wrapper.
#[derive(Clone)]
pub struct ContainerClient {
    docker: Arc<Docker>,
    endpoint: Option<String>,
}

impl ContainerClient {
    /// Connect using the given configuration and verify the daemon answers.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::RuntimeUnreachable`] if no endpoint responds.
    pub async fn connect(config: &ContainerClientConfig) -> Result<Self> {
        let docker = match config.endpoint.as_deref() {
            Some(endpoint) => Self::connect_endpoint(endpoint, config.timeout)?,
            None => Self::connect_local()?,
        };

        let client = Self {
            docker: Arc::new(docker),
            endpoint: config.endpoint.clone(),
        };

        client.ping().await?;

        Ok(client)
    }

    fn connect_endpoint(endpoint: &str, timeout: u64) -> Result<Docker> {
        debug!("Connecting to container runtime at {}", endpoint);

        let result = if endpoint.starts_with("unix://") {
            Docker::connect_with_socket(endpoint, timeout, bollard::API_DEFAULT_VERSION)
        } else {
            let url = endpoint.replacen("tcp://", "http://", 1);
            Docker::connect_with_http(&url, timeout, bollard::API_DEFAULT_VERSION)
        };

        let docker = result.map_err(|e| {
            ContainerError::RuntimeUnreachable(format!("{}: {}", endpoint, e))
        })?;
        info!("Connected to container runtime at {}", endpoint);
        Ok(docker)
    }

    /// Tries multiple connection strategies in order:
    /// 1. Local defaults (Unix socket, Windows named pipe, DOCKER_HOST)
    /// 2. Podman sockets
    fn connect_local() -> Result<Docker> {
        debug!("Attempting to connect to container runtime...");

        match Docker::connect_with_local_defaults() {
            Ok(docker) => {
                info!("Connected to container runtime via local defaults");
                return Ok(docker);
            }
            Err(e) => {
                debug!("Local defaults failed: {}", e);
            }
        }

        #[cfg(unix)]
        {
            let mut sockets = Vec::new();
            if let Ok(home) = std::env::var("HOME") {
                sockets.push(format!("unix://{}/run/podman/podman.sock", home));
            }
            sockets.push("unix:///run/podman/podman.sock".to_string());

            for socket in sockets {
                debug!("Trying Podman socket: {}", socket);
                match Docker::connect_with_socket(&socket, 120, bollard::API_DEFAULT_VERSION) {
                    Ok(docker) => {
                        info!("Connected to Podman via {}", socket);
                        return Ok(docker);
                    }
                    Err(e) => {
                        debug!("Podman socket {} failed: {}", socket, e);
                    }
                }
            }
        }

        Err(ContainerError::RuntimeUnreachable(
            "Failed to connect to Docker or Podman. Please ensure the daemon is running."
                .to_string(),
        ))
    }

    /// Explicit endpoint this client was connected to, if any.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Ping the container runtime to verify connectivity.
    ///
    /// # Errors
    ///
    /// Returns error if ping fails.
    pub async fn ping(&self) -> Result<()> {
        self.docker.ping().await.map_err(|e| {
            ContainerError::RuntimeUnreachable(format!("Failed to ping container runtime: {}", e))
        })?;
        debug!("Container runtime ping successful");
        Ok(())
    }

    /// Get version information from the container runtime.
    ///
    /// # Errors
    ///
    /// Returns error if version query fails.
    pub async fn version(&self) -> Result<bollard::models::SystemVersion> {
        Ok(self.docker.version().await?)
    }

    /// Get the underlying Docker client.
    pub fn docker(&self) -> &Docker {
        &self.docker
    }
}
