//! Compose group management.
//!
//! A group is one multi-service manifest brought up under a project name. Each
//! imported group owns a directory holding a copy of the manifest and a
//! `metadata.json` listing its member containers:
//!
//! ```text
//! docker-compose-groups/
//!   grp1/
//!     docker-compose.yaml
//!     metadata.json
//! ```
//!
//! Membership is resolved from the project label the compose CLI stamps on
//! every container. The recorded member list is a snapshot; listing skips
//! recorded containers that no longer exist.

use crate::container::{ContainerError, ContainerInfo, ContainerRuntime, Result};
use crate::env;
use crate::env::layout::{COMPOSE_MANIFEST_FILE_NAME, COMPOSE_METADATA_FILE_NAME};
use crate::env::runtime::COMPOSE_PROJECT_LABEL;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs as async_fs;
use tracing::{debug, info, warn};

/// Contents of a group's `metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMetadata {
    pub group_name: String,
    pub file_path: String,
    pub containers: Vec<String>,
}

/// One group as shown in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupListing {
    pub name: String,
    pub containers: Vec<ContainerInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Imports and drives compose groups.
pub struct ComposeGroupManager {
    runtime: Arc<dyn ContainerRuntime>,
    root: PathBuf,
}

impl ComposeGroupManager {
    /// Manager storing groups under `data_root`.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, data_root: &Path) -> Self {
        Self {
            runtime,
            root: env::compose_groups_dir_path(data_root),
        }
    }

    /// Directory holding all groups.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn group_dir(&self, group: &str) -> Result<PathBuf> {
        validate_group_name(group)?;
        Ok(self.root.join(group))
    }

    /// Validate `manifest`, bring it up as project `group` and persist it.
    ///
    /// # Errors
    ///
    /// - [`ContainerError::DuplicateGroup`] if the group directory exists
    /// - [`ContainerError::InvalidManifest`] if the config check rejects the manifest
    /// - the bring-up error if the group fails to start
    ///
    /// No group directory is left behind on failure.
    pub async fn import(&self, group: &str, manifest: &[u8]) -> Result<GroupMetadata> {
        let group_dir = self.group_dir(group)?;
        if async_fs::try_exists(&group_dir).await? {
            return Err(ContainerError::DuplicateGroup(group.to_string()));
        }

        async_fs::create_dir_all(&self.root).await?;
        let temp = self
            .root
            .join(format!(".{}-{}.yaml", group, uuid::Uuid::new_v4()));
        async_fs::write(&temp, manifest).await?;

        if let Err(e) = self.bring_up(&temp, group).await {
            remove_file_quietly(&temp).await;
            return Err(e);
        }

        let manifest_path = group_dir.join(COMPOSE_MANIFEST_FILE_NAME);
        let stored: std::io::Result<()> = async {
            async_fs::create_dir_all(&group_dir).await?;
            async_fs::rename(&temp, &manifest_path).await
        }
        .await;
        if let Err(e) = stored {
            remove_file_quietly(&temp).await;
            return Err(e.into());
        }

        let metadata = self.write_metadata(group, &manifest_path).await?;
        info!(
            "Imported compose group {} with {} containers",
            group,
            metadata.containers.len()
        );
        Ok(metadata)
    }

    async fn bring_up(&self, manifest: &Path, group: &str) -> Result<()> {
        self.runtime.compose_config(manifest).await?;
        self.runtime.compose_up(manifest, group, false).await
    }

    /// Start every member of `group`. A group with no members yet is brought
    /// up from its stored manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NotFound`] if the group has no directory.
    pub async fn start(&self, group: &str) -> Result<()> {
        let group_dir = self.existing_group_dir(group).await?;
        let members = self.members(group, true).await?;

        if members.is_empty() {
            let manifest = group_dir.join(COMPOSE_MANIFEST_FILE_NAME);
            return self.runtime.compose_up(&manifest, group, false).await;
        }

        for member in members {
            if let Err(e) = self.runtime.start_container(&member.id).await {
                warn!("Failed to start {} in group {}: {}", member.name, group, e);
            }
        }
        info!("Started compose group {}", group);
        Ok(())
    }

    /// Stop every running member of `group`, continuing past failures.
    ///
    /// # Errors
    ///
    /// Returns error only if members cannot be listed.
    pub async fn stop(&self, group: &str) -> Result<()> {
        validate_group_name(group)?;
        for member in self.members(group, false).await? {
            if let Err(e) = self.runtime.stop_container(&member.id).await {
                warn!("Failed to stop {} in group {}: {}", member.name, group, e);
            }
        }
        info!("Stopped compose group {}", group);
        Ok(())
    }

    /// Re-run the stored manifest with a forced build and refresh the member list.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NotFound`] if the group does not exist, or the
    /// bring-up error.
    pub async fn rebuild(&self, group: &str) -> Result<GroupMetadata> {
        let group_dir = self.existing_group_dir(group).await?;
        let manifest = group_dir.join(COMPOSE_MANIFEST_FILE_NAME);

        self.runtime.compose_up(&manifest, group, true).await?;
        let metadata = self.write_metadata(group, &manifest).await?;
        info!("Rebuilt compose group {}", group);
        Ok(metadata)
    }

    /// Force-remove every member of `group` and delete its directory.
    ///
    /// # Errors
    ///
    /// Returns error if a member cannot be removed. A missing directory is not
    /// an error.
    pub async fn delete(&self, group: &str) -> Result<()> {
        let group_dir = self.group_dir(group)?;

        for member in self.members(group, true).await? {
            match self.runtime.remove_container(&member.id, true).await {
                Ok(()) | Err(ContainerError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        match async_fs::remove_dir_all(&group_dir).await {
            Ok(()) => debug!("Removed {}", group_dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", group_dir.display(), e),
        }
        info!("Deleted compose group {}", group);
        Ok(())
    }

    /// Every group directory with its live members.
    ///
    /// A group whose metadata cannot be read is reported with an error and an
    /// empty member list.
    ///
    /// # Errors
    ///
    /// Returns error only if the groups directory itself cannot be read.
    pub async fn list(&self) -> Result<Vec<GroupListing>> {
        let mut entries = match async_fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();

        let mut groups = Vec::with_capacity(names.len());
        for name in names {
            let listing = match self.resolve_members(&name).await {
                Ok(containers) => GroupListing {
                    name,
                    containers,
                    error: None,
                },
                Err(e) => GroupListing {
                    name,
                    containers: Vec::new(),
                    error: Some(e.to_string()),
                },
            };
            groups.push(listing);
        }
        Ok(groups)
    }

    /// Read the stored metadata of `group`.
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing or malformed.
    pub async fn metadata(&self, group: &str) -> Result<GroupMetadata> {
        let path = self.group_dir(group)?.join(COMPOSE_METADATA_FILE_NAME);
        let data = match async_fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ContainerError::NotFound(format!(
                    "metadata for compose group {}",
                    group
                )));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&data)?)
    }

    async fn resolve_members(&self, group: &str) -> Result<Vec<ContainerInfo>> {
        let metadata = self.metadata(group).await?;
        let mut containers = Vec::new();
        for id in &metadata.containers {
            match self.runtime.inspect_container(id).await {
                Ok(info) => containers.push(info),
                Err(ContainerError::NotFound(_)) => {
                    debug!("Recorded member {} of {} no longer exists", id, group);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(containers)
    }

    async fn members(&self, group: &str, all: bool) -> Result<Vec<ContainerInfo>> {
        let label = format!("{}={}", COMPOSE_PROJECT_LABEL, group);
        self.runtime.list_containers(all, Some(&label)).await
    }

    async fn existing_group_dir(&self, group: &str) -> Result<PathBuf> {
        let dir = self.group_dir(group)?;
        if !async_fs::try_exists(&dir).await? {
            return Err(ContainerError::NotFound(format!("compose group {}", group)));
        }
        Ok(dir)
    }

    async fn write_metadata(&self, group: &str, manifest_path: &Path) -> Result<GroupMetadata> {
        let containers = self
            .members(group, true)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();

        let metadata = GroupMetadata {
            group_name: group.to_string(),
            file_path: manifest_path.to_string_lossy().to_string(),
            containers,
        };

        let path = self.group_dir(group)?.join(COMPOSE_METADATA_FILE_NAME);
        async_fs::write(&path, serde_json::to_vec_pretty(&metadata)?).await?;
        Ok(metadata)
    }
}

/// Reject group names that are empty or would escape the groups directory.
fn validate_group_name(group: &str) -> Result<()> {
    if group.is_empty()
        || group.contains(['/', '\\'])
        || group.contains("..")
        || group.starts_with('.')
    {
        return Err(ContainerError::Validation(format!(
            "Invalid group name: '{}'",
            group
        )));
    }
    Ok(())
}

async fn remove_file_quietly(path: &Path) {
    if let Err(e) = async_fs::remove_file(path).await {
        debug!("Could not remove {}: {}", path.display(), e);
    }
}
