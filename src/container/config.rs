//! Container configuration builders.
//!
//! Provides a fluent API for assembling the create request of an instance:
//! image, hostname, command, environment, bind mounts, port bindings, network
//! and terminal allocation.

use crate::container::{ContainerError, Result};
use bollard::service::{HostConfig, PortBinding};
use std::collections::HashMap;

/// Container configuration builder.
pub struct ContainerConfigBuilder {
    image: Option<String>,
    hostname: Option<String>,
    cmd: Option<Vec<String>>,
    env: Vec<String>,
    labels: HashMap<String, String>,
    binds: Vec<String>,
    network_mode: Option<String>,
    port_bindings: HashMap<String, Option<Vec<PortBinding>>>,
    tty: bool,
    open_stdin: bool,
}

impl Default for ContainerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerConfigBuilder {
    /// Create a new container configuration builder.
    pub fn new() -> Self {
        Self {
            image: None,
            hostname: None,
            cmd: None,
            env: Vec::new(),
            labels: HashMap::new(),
            binds: Vec::new(),
            network_mode: None,
            port_bindings: HashMap::new(),
            tty: false,
            open_stdin: false,
        }
    }

    /// Set the container image.
    pub fn image<S: Into<String>>(mut self, image: S) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Set the container hostname. Empty values are ignored.
    pub fn hostname<S: Into<String>>(mut self, hostname: S) -> Self {
        let hostname = hostname.into();
        if !hostname.is_empty() {
            self.hostname = Some(hostname);
        }
        self
    }

    /// Set the command to run in the container.
    pub fn cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cmd: Vec<String> = cmd.into_iter().map(|s| s.into()).collect();
        self.cmd = if cmd.is_empty() { None } else { Some(cmd) };
        self
    }

    /// Add an environment variable.
    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.push(format!("{}={}", key.into(), value.into()));
        self
    }

    /// Add multiple environment variables.
    pub fn envs<I, K, V>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in envs {
            self.env.push(format!("{}={}", k.into(), v.into()));
        }
        self
    }

    /// Add a label to the container.
    pub fn label<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add a read-write bind mount. A later bind for the same host path
    /// replaces the earlier one.
    pub fn bind<H: Into<String>, C: Into<String>>(
        mut self,
        host_path: H,
        container_path: C,
    ) -> Self {
        let host_path = host_path.into();
        let prefix = format!("{}:", host_path);
        self.binds.retain(|b| !b.starts_with(&prefix));
        self.binds
            .push(format!("{}:{}:rw", host_path, container_path.into()));
        self
    }

    /// Set network mode; a user-defined network name attaches to that network.
    pub fn network_mode<S: Into<String>>(mut self, mode: S) -> Self {
        self.network_mode = Some(mode.into());
        self
    }

    /// Add a port binding (container_port/protocol -> host_port).
    pub fn port_binding<S: Into<String>>(mut self, container_port: S, host_port: u16) -> Self {
        let mut container_port = container_port.into();
        if !container_port.contains('/') {
            container_port.push_str("/tcp");
        }
        self.port_bindings.insert(
            container_port,
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(host_port.to_string()),
            }]),
        );
        self
    }

    /// Allocate a pseudo-terminal and keep stdin open.
    pub fn tty(mut self, enable: bool) -> Self {
        self.tty = enable;
        self.open_stdin = enable;
        self
    }

    /// Build the container configuration.
    ///
    /// # Errors
    ///
    /// Returns error if required fields are missing or invalid.
    pub fn build(self) -> Result<ContainerConfig> {
        let image = self
            .image
            .ok_or_else(|| ContainerError::Validation("Image is required".to_string()))?;

        let host_config = HostConfig {
            binds: if self.binds.is_empty() {
                None
            } else {
                Some(self.binds)
            },
            network_mode: self.network_mode,
            port_bindings: if self.port_bindings.is_empty() {
                None
            } else {
                Some(self.port_bindings)
            },
            ..Default::default()
        };

        Ok(ContainerConfig {
            image,
            hostname: self.hostname,
            cmd: self.cmd,
            env: if self.env.is_empty() {
                None
            } else {
                Some(self.env)
            },
            labels: if self.labels.is_empty() {
                None
            } else {
                Some(self.labels)
            },
            tty: self.tty,
            open_stdin: self.open_stdin,
            host_config,
        })
    }
}

/// Container configuration.
///
/// Holds container configuration for creation.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Image name
    pub image: String,
    /// Hostname
    pub hostname: Option<String>,
    /// Command to run
    pub cmd: Option<Vec<String>>,
    /// Environment variables (`KEY=VALUE`)
    pub env: Option<Vec<String>>,
    /// Labels
    pub labels: Option<HashMap<String, String>>,
    /// Allocate a pseudo-terminal
    pub tty: bool,
    /// Keep stdin open
    pub open_stdin: bool,
    /// Host configuration
    pub host_config: HostConfig,
}

impl ContainerConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ContainerConfigBuilder {
        ContainerConfigBuilder::new()
    }

    /// Look up an environment variable value.
    pub fn env_value(&self, key: &str) -> Option<&str> {
        let prefix = format!("{}=", key);
        self.env
            .as_ref()?
            .iter()
            .find_map(|e| e.strip_prefix(prefix.as_str()))
    }

    /// Container ports with a host binding.
    pub fn exposed_ports(&self) -> Vec<String> {
        let mut ports: Vec<String> = self
            .host_config
            .port_bindings
            .as_ref()
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default();
        ports.sort();
        ports
    }
}
