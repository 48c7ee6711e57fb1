//! Environment constants and path utilities for the control panel.
//!
//! This module centralizes all fixed names, image templates and on-disk
//! locations used throughout the application, making them easier to maintain
//! and modify.

use std::path::{Path, PathBuf};

/// Hidden configuration directory name (like .git, .vscode)
pub const PANEL_DIR_NAME: &str = ".dockpanel";

/// Configuration file name inside [`PANEL_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name looked up directly in the working directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "dockpanel.toml";

/// Runtime-facing constants
pub mod runtime {
    /// Shared bridge network joining every managed container
    pub const DEFAULT_NETWORK_NAME: &str = "denodo-net";

    /// Registry prefix for platform and manager images
    pub const DEFAULT_REGISTRY_PREFIX: &str = "gcr.io/denodo-container";

    /// Image repository for the auxiliary manager category
    pub const MANAGER_REPOSITORY: &str = "solution-manager";

    /// Image repository for the main platform category
    pub const PLATFORM_REPOSITORY: &str = "denodo-platform";

    /// Group value selecting the manager category
    pub const MANAGER_GROUP: &str = "solution_manager";

    /// Group assumed when an imported record carries none
    pub const DEFAULT_GROUP: &str = "default";

    /// In-container folder bind-mounted from the per-instance shared directory
    pub const CONTAINER_SHARED_PATH: &str = "/opt/denodo/shared";

    /// Label the compose CLI stamps on every container of a project
    pub const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";

    /// Name prefix of auxiliary database containers
    pub const DATABASE_NAME_PREFIX: &str = "denodo-db-";

    /// Shell spawned for interactive terminal sessions
    pub const TERMINAL_SHELL: &str = "/bin/bash";

    /// User the terminal shell runs as
    pub const TERMINAL_USER: &str = "root";
}

/// Directory and file names below the data root
pub mod layout {
    /// Per-instance launch configuration records
    pub const CONFIG_RECORDS_DIR_NAME: &str = "denodo-container-configuration";

    /// Suffix of a configuration record file (`<instance>-config.json`)
    pub const CONFIG_RECORD_SUFFIX: &str = "-config.json";

    /// Root of host-side volumes
    pub const VOLUMES_DIR_NAME: &str = "volumes";

    /// Shared-data directories, one per instance
    pub const SHARED_DIR_NAME: &str = "denodo_shared";

    /// Log directories, one per instance
    pub const LOGS_DIR_NAME: &str = "denodo_logs";

    /// Imported compose groups, one directory per group
    pub const COMPOSE_GROUPS_DIR_NAME: &str = "docker-compose-groups";

    /// Manifest copy stored inside a compose group directory
    pub const COMPOSE_MANIFEST_FILE_NAME: &str = "docker-compose.yaml";

    /// Group metadata stored inside a compose group directory
    pub const COMPOSE_METADATA_FILE_NAME: &str = "metadata.json";

    /// Auxiliary database manifest
    pub const DATABASES_FILE: &str = "databases/databases.yaml";

    /// Image tag listing for the platform category
    pub const PLATFORM_TAGS_FILE: &str = "data/denodo_docker_images.txt";

    /// Image tag listing for the manager category
    pub const MANAGER_TAGS_FILE: &str = "data/sm_docker_images.txt";

    /// Root of licence files, organised as `mount/<version>/license/*.lic`
    pub const LICENSE_ROOT_DIR_NAME: &str = "mount";
}

/// Build the configuration record directory from a data root
pub fn config_records_dir_path(data_root: &Path) -> PathBuf {
    data_root.join(layout::CONFIG_RECORDS_DIR_NAME)
}

/// Build the shared-data directory for an instance
pub fn shared_dir_path(data_root: &Path, instance: &str) -> PathBuf {
    data_root
        .join(layout::VOLUMES_DIR_NAME)
        .join(layout::SHARED_DIR_NAME)
        .join(instance)
}

/// Build the logs directory for an instance
pub fn logs_dir_path(data_root: &Path, instance: &str) -> PathBuf {
    data_root
        .join(layout::VOLUMES_DIR_NAME)
        .join(layout::LOGS_DIR_NAME)
        .join(instance)
}

/// Build the compose groups root directory
pub fn compose_groups_dir_path(data_root: &Path) -> PathBuf {
    data_root.join(layout::COMPOSE_GROUPS_DIR_NAME)
}

/// Build the auxiliary database manifest path
pub fn databases_file_path(data_root: &Path) -> PathBuf {
    data_root.join(layout::DATABASES_FILE)
}

/// Build the licence directory for a platform major version (`denodo9`, ...)
pub fn license_dir_path(data_root: &Path, version: &str) -> PathBuf {
    data_root
        .join(layout::LICENSE_ROOT_DIR_NAME)
        .join(version)
        .join("license")
}

/// Build config directory path in user's home directory
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    home_dir.join(PANEL_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build local config file path in current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(PANEL_DIR_NAME).join(CONFIG_FILE_NAME)
}
