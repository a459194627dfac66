use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{Storage, StorageError};
use crate::model::chart::{ChartPoint, ChartPointCollection, SprintKey};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileSystemConfig {
    /// Directory holding the `data/` folder. Defaults to the working directory.
    pub directory: Option<PathBuf>,
}

/// On-disk record: a chart point tagged with the sprint it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredPoint {
    #[serde(flatten)]
    point: ChartPoint,
    sprint: String,
}

/// One JSON file per sprint key under `<directory>/data/`.
pub struct FileSystemStorage {
    root: PathBuf,
}

impl FileSystemStorage {
    pub fn new(config: FileSystemConfig) -> Self {
        let base = config.directory.unwrap_or_else(|| PathBuf::from("."));
        Self {
            root: base.join("data"),
        }
    }

    fn storage_file_path(&self, sprint: &SprintKey) -> PathBuf {
        let name = sprint.as_str();
        if name.ends_with(".json") {
            self.root.join(name)
        } else {
            self.root.join(format!("{name}.json"))
        }
    }

    /// Reads the sprint file, creating it empty on first access.
    async fn read_raw(&self, path: &Path) -> Result<BTreeMap<String, StoredPoint>, StorageError> {
        let io_err = |source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        if !tokio::fs::try_exists(path).await.map_err(io_err)? {
            tokio::fs::write(path, b"").await.map_err(io_err)?;
        }

        let contents = tokio::fs::read_to_string(path).await.map_err(io_err)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).map_err(|source| StorageError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    async fn write_raw(
        &self,
        path: &Path,
        data: &BTreeMap<String, StoredPoint>,
    ) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(data)?;
        // Unique per write so overlapping sets never share a temp file
        let tmp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4()));
        let io_err = |source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        };
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileSystemStorage {
    fn name(&self) -> &str {
        "FileSystem"
    }

    async fn get(&self, sprint: &SprintKey) -> Result<Option<ChartPointCollection>, StorageError> {
        let path = self.storage_file_path(sprint);
        let raw = self.read_raw(&path).await?;

        let points = raw
            .into_iter()
            .filter(|(_, stored)| stored.sprint == sprint.as_str())
            .map(|(id, stored)| (id, stored.point))
            .collect();

        Ok(Some(points))
    }

    async fn set(&self, sprint: &SprintKey, points: &[ChartPoint]) -> Result<(), StorageError> {
        let path = self.storage_file_path(sprint);
        let mut data = self.read_raw(&path).await?;

        for point in points {
            data.insert(
                uuid::Uuid::new_v4().to_string(),
                StoredPoint {
                    point: point.clone(),
                    sprint: sprint.to_string(),
                },
            );
        }

        self.write_raw(&path, &data).await?;
        log::debug!("Stored {} points for sprint {sprint} in {}", points.len(), path.display());
        Ok(())
    }
}
