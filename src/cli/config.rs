//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./dockpanel.toml or ./.dockpanel/config.toml
//! 2. User config: ~/.dockpanel/config.toml
//! 3. System config: /etc/dockpanel/config.toml
//! 4. Built-in defaults

use crate::container::{ContainerClientConfig, DockerRuntimeConfig, LifecycleConfig, PathTranslator};
use crate::env;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Address the web panel binds to
    pub listen: SocketAddr,
    /// Root of configuration records, shared volumes, compose groups and catalogs
    pub data_root: PathBuf,
    /// Runtime endpoint (`unix:///...`, `tcp://host:port`); local defaults when unset
    pub runtime_endpoint: Option<String>,
    /// Bridge network joined by every instance
    pub network: String,
    /// Registry prefix of managed images
    pub registry_prefix: String,
    /// Seconds to wait for a graceful stop
    pub stop_timeout: i64,
    /// Lines returned by a non-full log request
    pub log_tail: usize,
    /// Force drive-letter path translation on or off; detected from the host when unset
    pub force_drive_letter_paths: Option<bool>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::LOCALHOST, 8000)),
            data_root: PathBuf::from("."),
            runtime_endpoint: None,
            network: env::runtime::DEFAULT_NETWORK_NAME.to_string(),
            registry_prefix: env::runtime::DEFAULT_REGISTRY_PREFIX.to_string(),
            stop_timeout: 10,
            log_tail: 500,
            force_drive_letter_paths: None,
        }
    }
}

impl PanelConfig {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading configuration {}", path.display()))?;
        let config: PanelConfig = toml::from_str(&content)
            .with_context(|| format!("parsing configuration {}", path.display()))?;
        Ok(config)
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Settings for the lifecycle orchestrator.
    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            network: self.network.clone(),
            registry_prefix: self.registry_prefix.clone(),
            data_root: self.data_root.clone(),
            translator: PathTranslator::from_override(self.force_drive_letter_paths),
            log_tail: self.log_tail,
            ..LifecycleConfig::default()
        }
    }

    /// Settings for the runtime connection.
    pub fn runtime_config(&self) -> DockerRuntimeConfig {
        DockerRuntimeConfig {
            client: ContainerClientConfig {
                endpoint: self.runtime_endpoint.clone(),
                ..ContainerClientConfig::default()
            },
            stop_timeout: self.stop_timeout,
        }
    }
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load `explicit` if given, otherwise the first file in the hierarchy,
    /// otherwise defaults.
    pub fn discover_config(explicit: Option<&Path>) -> anyhow::Result<PanelConfig> {
        if let Some(path) = explicit {
            info!("Loading configuration from: {:?}", path);
            return PanelConfig::from_toml_file(path);
        }

        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return PanelConfig::from_toml_file(config_path);
        }

        info!("No configuration file found, using defaults");
        Ok(PanelConfig::default())
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = Self::get_config_candidates();

        for candidate in candidates {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = std_env::current_dir() {
            candidates.push(current_dir.join(env::LOCAL_CONFIG_FILE_NAME));
            candidates.push(env::local_config_file_path(&current_dir));
        }

        if let Some(home_dir) = Self::get_home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        #[cfg(unix)]
        candidates.push(PathBuf::from("/etc/dockpanel/config.toml"));

        #[cfg(windows)]
        if let Ok(program_data) = std_env::var("PROGRAMDATA") {
            candidates.push(PathBuf::from(program_data).join("dockpanel").join("config.toml"));
        }

        candidates
    }

    /// Get home directory path
    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info(active: &PanelConfig) {
        println!("Configuration Discovery Hierarchy:");
        println!();

        let candidates = Self::get_config_candidates();
        for (i, candidate) in candidates.iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "✓ EXISTS"
                } else {
                    "✗ NOT A FILE"
                }
            } else {
                "✗ NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        if let Some(found) = Self::find_config_file() {
            println!("Active configuration: {:?}", found);
        } else {
            println!("Active configuration: Built-in defaults");
        }

        println!();
        match toml::to_string_pretty(active) {
            Ok(text) => println!("{}", text),
            Err(e) => println!("(cannot render configuration: {})", e),
        }
    }
}
