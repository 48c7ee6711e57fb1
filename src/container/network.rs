//! Shared bridge network management.
//!
//! Every managed container joins one user-defined bridge network. The network
//! is created on first use; concurrent creators rely on the daemon
//! deduplicating by name.

use crate::container::{ContainerError, Result};
use bollard::Docker;
use tracing::{debug, info, warn};

/// Network manager for the shared bridge network.
pub struct NetworkManager {
    docker: Docker,
}

impl NetworkManager {
    /// Create a new network manager.
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Return the ID of network `name`, creating a bridge network if absent.
    ///
    /// # Errors
    ///
    /// Returns error if inspection or creation fails.
    pub async fn ensure_network(&self, name: &str) -> Result<String> {
        if let Some(id) = self.network_id(name).await? {
            debug!("Network {} already exists ({})", name, id);
            return Ok(id);
        }

        warn!("Network '{}' not found. Creating...", name);
        match self
            .docker
            .create_network(bollard::network::CreateNetworkOptions {
                name,
                driver: "bridge",
                ..Default::default()
            })
            .await
        {
            Ok(response) => {
                info!("Created network: {} ({})", name, response.id);
                Ok(response.id)
            }
            // Another request created it between inspect and create.
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 409, ..
            }) => self
                .network_id(name)
                .await?
                .ok_or_else(|| ContainerError::NotFound(format!("network {}", name))),
            Err(e) => Err(ContainerError::Api(e)),
        }
    }

    /// Look up a network ID by name.
    ///
    /// # Errors
    ///
    /// Returns error if network inspection fails.
    pub async fn network_id(&self, name: &str) -> Result<Option<String>> {
        match self
            .docker
            .inspect_network(
                name,
                None::<bollard::network::InspectNetworkOptions<String>>,
            )
            .await
        {
            Ok(network) => Ok(Some(network.id.unwrap_or_else(|| name.to_string()))),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(None),
            Err(e) => Err(ContainerError::Api(e)),
        }
    }
}
