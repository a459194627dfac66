pub mod elasticsearch;
pub mod filesystem;

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;

use crate::model::chart::{ChartPoint, ChartPointCollection, SprintKey};

/// Names accepted for `storage.type`, matched case-insensitively.
pub const STORAGE_PLUGINS: [&str; 2] = ["FileSystem", "Elasticsearch"];

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("stored data in {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize chart points: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("could not connect to storage backend: {0}")]
    Connection(String),
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("Data plugin \"{name}\" was not found. Plugin options:\n{}", available_list(.available))]
    UnknownPlugin {
        name: String,
        available: Vec<String>,
    },
    #[error("invalid configuration for data plugin {plugin}: {reason}")]
    InvalidConfig { plugin: String, reason: String },
}

fn available_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("\"{n}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Append-only store of chart points, partitioned by sprint key.
#[async_trait]
pub trait Storage: Send + Sync {
    fn name(&self) -> &str;

    /// All points stored under `sprint`.
    ///
    /// `Ok(Some(_))` is the stored collection, empty when nothing was written
    /// yet. `Ok(None)` means the backend failed to read, logged the failure and
    /// chose not to propagate it.
    async fn get(&self, sprint: &SprintKey) -> Result<Option<ChartPointCollection>, StorageError>;

    /// Appends `points` under `sprint`, each with a fresh identifier. Existing
    /// entries are never replaced and identical points are not deduplicated.
    async fn set(&self, sprint: &SprintKey, points: &[ChartPoint]) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub plugin: Option<String>,
    pub config: Option<toml::Value>,
}

/// Builds the configured backend. Runs once at start-up; the document
/// database connection is established here.
pub async fn resolve_storage(config: &StorageConfig) -> Result<Box<dyn Storage>, StorageError> {
    let Some(name) = config.plugin.as_deref() else {
        log::warn!("No data plugin name provided from configuration. Using default FileSystem plugin.");
        let cfg = plugin_config::<filesystem::FileSystemConfig>("FileSystem", config)?;
        return Ok(Box::new(filesystem::FileSystemStorage::new(cfg)));
    };

    let plugin = STORAGE_PLUGINS
        .iter()
        .find(|p| p.eq_ignore_ascii_case(name))
        .copied()
        .ok_or_else(|| StorageError::UnknownPlugin {
            name: name.to_string(),
            available: STORAGE_PLUGINS.iter().map(|p| p.to_string()).collect(),
        })?;

    match plugin {
        "FileSystem" => {
            let cfg = plugin_config::<filesystem::FileSystemConfig>(plugin, config)?;
            Ok(Box::new(filesystem::FileSystemStorage::new(cfg)))
        }
        _ => {
            let cfg = plugin_config::<elasticsearch::ElasticsearchConfig>(plugin, config)?;
            let storage = elasticsearch::ElasticsearchStorage::connect(cfg).await?;
            Ok(Box::new(storage))
        }
    }
}

fn plugin_config<T>(plugin: &str, config: &StorageConfig) -> Result<T, StorageError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    match &config.config {
        None => Ok(T::default()),
        Some(value) => value
            .clone()
            .try_into()
            .map_err(|e: toml::de::Error| StorageError::InvalidConfig {
                plugin: plugin.to_string(),
                reason: e.to_string(),
            }),
    }
}
