//! Launch specification types and parsing.
//!
//! A [`LaunchSpec`] is the raw form submission (or a replayed configuration
//! record). The parsers here turn its string entries into typed mappings and
//! reject malformed ones with [`ContainerError::Validation`].

use crate::container::{ContainerError, Result};
use crate::env::runtime::{DEFAULT_GROUP, MANAGER_GROUP, MANAGER_REPOSITORY, PLATFORM_REPOSITORY};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Every parameter needed to start one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Image tag
    pub tag: String,
    /// Instance group, selects the image repository
    #[serde(default = "default_group")]
    pub group: String,
    /// Container name
    pub container_name: String,
    /// Container hostname
    #[serde(default)]
    pub hostname: String,
    /// `host_path:container_path` entries
    #[serde(default)]
    pub volumes: Vec<String>,
    /// `host:container` entries
    #[serde(default)]
    pub ports: Vec<String>,
    /// `KEY=VALUE` entries
    #[serde(default)]
    pub env_vars: Vec<String>,
    /// Command line passed to the image entrypoint
    #[serde(default)]
    pub command: String,
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

impl LaunchSpec {
    /// Trim every entry and drop blank ones.
    pub fn normalized(mut self) -> Self {
        self.volumes = clean_entries(self.volumes);
        self.ports = clean_entries(self.ports);
        self.env_vars = clean_entries(self.env_vars);
        self.container_name = self.container_name.trim().to_string();
        self.hostname = self.hostname.trim().to_string();
        self.tag = self.tag.trim().to_string();
        self
    }

    /// Image category of this spec's group.
    pub fn category(&self) -> ImageCategory {
        ImageCategory::from_group(&self.group)
    }

    /// A copy with password-bearing environment values masked.
    pub fn masked(&self) -> Self {
        Self {
            env_vars: mask_env_vars(&self.env_vars),
            ..self.clone()
        }
    }

    /// Parse all port entries.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Validation`] on the first malformed entry.
    pub fn port_mappings(&self) -> Result<Vec<PortMapping>> {
        self.ports.iter().map(|p| PortMapping::parse(p)).collect()
    }

    /// Parse all volume entries, skipping blank ones.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Validation`] on the first malformed entry.
    pub fn volume_mappings(&self) -> Result<Vec<VolumeMapping>> {
        self.volumes
            .iter()
            .filter(|v| !v.trim().is_empty())
            .map(|v| VolumeMapping::parse(v))
            .collect()
    }

    /// Parse all environment entries.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Validation`] on the first entry without `=`.
    pub fn env_assignments(&self) -> Result<Vec<EnvAssignment>> {
        self.env_vars.iter().map(|e| EnvAssignment::parse(e)).collect()
    }

    /// Command split into arguments.
    pub fn command_args(&self) -> Vec<String> {
        self.command.split_whitespace().map(String::from).collect()
    }
}

/// Split a multi-line form field into trimmed, non-empty entries.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

fn clean_entries(entries: Vec<String>) -> Vec<String> {
    entries
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect()
}

/// The two image families the panel launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCategory {
    /// The auxiliary manager product
    Manager,
    /// The main platform
    Platform,
}

impl ImageCategory {
    /// Category for a group name.
    pub fn from_group(group: &str) -> Self {
        if group == MANAGER_GROUP {
            Self::Manager
        } else {
            Self::Platform
        }
    }

    /// Repository name under the registry prefix.
    pub fn repository(&self) -> &'static str {
        match self {
            Self::Manager => MANAGER_REPOSITORY,
            Self::Platform => PLATFORM_REPOSITORY,
        }
    }

    /// Fully-qualified image reference for `tag`.
    pub fn image_reference(&self, registry_prefix: &str, tag: &str) -> String {
        format!(
            "{}/{}:{}",
            registry_prefix.trim_end_matches('/'),
            self.repository(),
            tag
        )
    }
}

/// A `host:container` port binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

impl PortMapping {
    /// Parse `"8080:80"` into host 8080, container 80.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Validation`] unless the entry is exactly two
    /// port numbers separated by one colon.
    pub fn parse(entry: &str) -> Result<Self> {
        let invalid = || {
            ContainerError::Validation(format!(
                "Invalid port mapping: '{}'. Use host_port:container_port",
                entry
            ))
        };

        let (host, container) = entry.trim().split_once(':').ok_or_else(invalid)?;
        let host = host.trim().parse::<u16>().map_err(|_| invalid())?;
        let container = container.trim().parse::<u16>().map_err(|_| invalid())?;
        Ok(Self { host, container })
    }
}

/// A bind mount from the host into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMapping {
    pub host_path: String,
    pub container_path: String,
}

impl VolumeMapping {
    /// Parse `host:container`, splitting on the last colon so drive-letter
    /// host paths keep their own colon.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Validation`] if either side is empty.
    pub fn parse(entry: &str) -> Result<Self> {
        let entry = entry.trim();
        match entry.rsplit_once(':') {
            Some((host, container)) if !host.trim().is_empty() && !container.trim().is_empty() => {
                Ok(Self {
                    host_path: host.trim().to_string(),
                    container_path: container.trim().to_string(),
                })
            }
            _ => Err(ContainerError::Validation(format!(
                "Invalid volume format: '{}'. Use host_path:container_path",
                entry
            ))),
        }
    }

    /// Whether the container path names a file (last segment contains a dot).
    pub fn is_file_target(&self) -> bool {
        self.container_path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .is_some_and(|segment| segment.contains('.'))
    }
}

/// One `KEY=VALUE` environment assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvAssignment {
    pub key: String,
    pub value: String,
}

impl EnvAssignment {
    /// Parse on the first `=`; the value may itself contain `=`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Validation`] if there is no `=` or the key is empty.
    pub fn parse(entry: &str) -> Result<Self> {
        match entry.trim().split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => Ok(Self {
                key: key.trim().to_string(),
                value: value.to_string(),
            }),
            _ => Err(ContainerError::Validation(format!(
                "Invalid environment variable: '{}'. Use KEY=VALUE",
                entry
            ))),
        }
    }

    /// Render back to `KEY=VALUE`.
    pub fn to_entry(&self) -> String {
        format!("{}={}", self.key, self.value)
    }
}

/// Check that each volume's host path exists, and is a regular file when the
/// container path names a file.
///
/// # Errors
///
/// Returns [`ContainerError::Validation`] for malformed entries and for
/// missing or mistyped host paths.
pub fn validate_volume_paths(volumes: &[String]) -> Result<()> {
    for entry in volumes.iter().filter(|v| !v.trim().is_empty()) {
        let mapping = VolumeMapping::parse(entry)?;
        let host = Path::new(&mapping.host_path);

        if !host.exists() {
            return Err(ContainerError::Validation(format!(
                "Volume path does not exist: {}",
                mapping.host_path
            )));
        }
        if mapping.is_file_target() && !host.is_file() {
            return Err(ContainerError::Validation(format!(
                "Expected a file at: {}, but it's missing or not a file",
                mapping.host_path
            )));
        }
    }
    Ok(())
}

/// Replace the value of every `KEY=VALUE` whose key ends in `PASSWORD`.
pub fn mask_env_vars(env_vars: &[String]) -> Vec<String> {
    env_vars
        .iter()
        .map(|var| match var.split_once('=') {
            Some((key, _)) if key.ends_with("PASSWORD") => format!("{}=********", key),
            _ => var.clone(),
        })
        .collect()
}
