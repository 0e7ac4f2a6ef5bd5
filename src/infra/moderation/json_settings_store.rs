use crate::core::moderation::{FilterConfig, FilterSettingsStore, StoreError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Filter settings kept in a single pretty-printed JSON file.
pub struct JsonFilterSettingsStore {
    path: PathBuf,
    cache: RwLock<Option<FilterConfig>>,
}

fn read_file(path: &Path) -> Result<Option<FilterConfig>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let file = std::fs::File::open(path)?;
    Ok(Some(serde_json::from_reader(std::io::BufReader::new(file))?))
}

impl JsonFilterSettingsStore {
    /// Open the store, reading the file if it exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let cache = read_file(&path)?;

        Ok(Self {
            path,
            cache: RwLock::new(cache),
        })
    }

    /// Re-read the file, picking up edits made outside this process.
    ///
    /// On error the cached value is left as it was.
    pub async fn reload(&self) -> Result<Option<FilterConfig>, StoreError> {
        let fresh = read_file(&self.path)?;
        let mut cache = self.cache.write().await;
        *cache = fresh.clone();
        Ok(fresh)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let cache = self.cache.read().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = std::fs::File::create(&self.path)?;
        serde_json::to_writer_pretty(file, &*cache)?;
        Ok(())
    }
}

#[async_trait]
impl FilterSettingsStore for JsonFilterSettingsStore {
    async fn load(&self) -> Result<Option<FilterConfig>, StoreError> {
        let cache = self.cache.read().await;
        Ok(cache.clone())
    }

    async fn save(&self, config: &FilterConfig) -> Result<(), StoreError> {
        let mut cache = self.cache.write().await;
        *cache = Some(config.clone());
        drop(cache); // Release lock before persisting
        self.persist().await
    }
}
