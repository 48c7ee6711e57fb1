//! Auxiliary database catalog.
//!
//! A YAML mapping of key to container description:
//!
//! ```yaml
//! mysql:
//!   name: denodo-db-mysql
//!   image: mysql:8
//!   ports:
//!     3306: 3306
//!   env:
//!     MYSQL_ROOT_PASSWORD: secret
//!   autostart: true
//! ```
//!
//! Port keys are container ports, values host ports. Scalar keys and values
//! are read as strings whatever their YAML type.

use crate::container::{ContainerError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// One auxiliary database container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSpec {
    /// Full container name
    pub name: String,
    /// Image reference
    pub image: String,
    /// Container port to host port
    #[serde(default, deserialize_with = "scalar_map")]
    pub ports: BTreeMap<String, String>,
    /// Environment
    #[serde(default, deserialize_with = "scalar_map")]
    pub env: BTreeMap<String, String>,
    /// Start at panel startup when absent
    #[serde(default)]
    pub autostart: bool,
    /// Optional command override
    #[serde(default)]
    pub command: Option<String>,
}

impl DatabaseSpec {
    /// First host port, for display.
    pub fn first_host_port(&self) -> Option<&str> {
        self.ports.values().next().map(String::as_str)
    }
}

/// Parsed catalog, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseCatalog {
    entries: BTreeMap<String, DatabaseSpec>,
}

impl DatabaseCatalog {
    /// Parse catalog YAML. An empty document is an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Yaml`] if the document is malformed.
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let entries: Option<BTreeMap<String, DatabaseSpec>> = serde_yaml::from_str(text)?;
        Ok(Self {
            entries: entries.unwrap_or_default(),
        })
    }

    /// Load the catalog from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NotFound`] if the file is missing, or a parse error.
    pub async fn load(path: &Path) -> Result<Self> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ContainerError::NotFound(format!(
                    "database catalog {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        let catalog = Self::from_yaml(&text)?;
        debug!("Loaded {} database entries from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Entry for `key`.
    pub fn get(&self, key: &str) -> Option<&DatabaseSpec> {
        self.entries.get(key)
    }

    /// All entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &DatabaseSpec)> {
        self.entries.iter()
    }

    /// Entries flagged for autostart.
    pub fn autostart_entries(&self) -> impl Iterator<Item = (&String, &DatabaseSpec)> {
        self.entries.iter().filter(|(_, spec)| spec.autostart)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn scalar_map<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_yaml::Mapping> = Option::deserialize(deserializer)?;

    raw.unwrap_or_default()
        .into_iter()
        .map(|(k, v)| {
            Ok((
                scalar_to_string::<D::Error>(&k)?,
                scalar_to_string::<D::Error>(&v)?,
            ))
        })
        .collect()
}

fn scalar_to_string<E: serde::de::Error>(
    value: &serde_yaml::Value,
) -> std::result::Result<String, E> {
    match value {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Null => Ok(String::new()),
        other => Err(E::custom(format!("expected a scalar, found {:?}", other))),
    }
}
