//! Durable JSON-file maps with dirty-flag batched writes and crash-safe
//! restore. One [`JsonCollection`] instance owns one file and one lock;
//! agents, command results, and IOC matches each get their own instance so
//! the "never hold two collection locks simultaneously" invariant holds
//! across distinct collections without needing a single global lock.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use edr_shared::{now_ts, EdrError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

pub struct JsonCollection<V> {
    name: &'static str,
    path: PathBuf,
    data: RwLock<HashMap<String, V>>,
    dirty: Mutex<bool>,
    last_save: Mutex<Instant>,
    save_interval: Duration,
}

impl<V> JsonCollection<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    /// Loads `<dir>/<name>.json`, recovering from a corrupted file by
    /// renaming it aside and starting empty.
    pub async fn load(dir: &Path, name: &'static str, save_interval: Duration) -> Result<Self> {
        let path = dir.join(format!("{name}.json"));
        let data = Self::load_or_recover(&path, name).await?;
        Ok(Self {
            name,
            path,
            data: RwLock::new(data),
            dirty: Mutex::new(false),
            last_save: Mutex::new(Instant::now()),
            save_interval,
        })
    }

    async fn load_or_recover(path: &Path, name: &str) -> Result<HashMap<String, V>> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(err) => {
                return Err(EdrError::Persistence(format!(
                    "reading {}: {err}",
                    path.display()
                )))
            }
        };
        match serde_json::from_str::<HashMap<String, V>>(&contents) {
            Ok(map) => Ok(map),
            Err(err) => {
                tracing::error!(collection = name, %err, file = %path.display(), "corrupted collection file, recovering");
                let corrupted = PathBuf::from(format!("{}.corrupted.{}", path.display(), now_ts()));
                tokio::fs::rename(path, &corrupted)
                    .await
                    .map_err(|e| EdrError::Persistence(format!("renaming corrupted file aside: {e}")))?;
                Ok(HashMap::new())
            }
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.data.read().await.get(key).cloned()
    }

    pub async fn all(&self) -> Vec<V> {
        self.data.read().await.values().cloned().collect()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.data.read().await.contains_key(key)
    }

    /// Inserts or replaces `key`, marks the collection dirty, and performs a
    /// throttled save if the save interval has elapsed.
    pub async fn put(&self, key: String, value: V) {
        self.data.write().await.insert(key, value);
        self.mark_dirty().await;
        self.maybe_save().await;
    }

    pub async fn remove(&self, key: &str) -> Option<V> {
        let removed = self.data.write().await.remove(key);
        if removed.is_some() {
            self.mark_dirty().await;
            self.maybe_save().await;
        }
        removed
    }

    async fn mark_dirty(&self) {
        *self.dirty.lock().await = true;
    }

    async fn maybe_save(&self) {
        if !*self.dirty.lock().await {
            return;
        }
        let elapsed = self.last_save.lock().await.elapsed();
        if elapsed >= self.save_interval {
            if let Err(err) = self.force_save().await {
                tracing::error!(collection = self.name, %err, "throttled save failed");
            }
        }
    }

    /// Flushes the collection to disk unconditionally via whole-file
    /// replace: serialize, write to a temp file, fsync, rename over target.
    pub async fn force_save(&self) -> Result<()> {
        let snapshot = self.data.read().await.clone();
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| EdrError::Persistence(format!("serializing {}: {e}", self.name)))?;
        let tmp_path = PathBuf::from(format!("{}.tmp", self.path.display()));
        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .map_err(|e| EdrError::Persistence(format!("creating {}: {e}", tmp_path.display())))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| EdrError::Persistence(format!("writing {}: {e}", tmp_path.display())))?;
        file.sync_all()
            .await
            .map_err(|e| EdrError::Persistence(format!("fsync {}: {e}", tmp_path.display())))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| EdrError::Persistence(format!("renaming into place: {e}")))?;
        *self.dirty.lock().await = false;
        *self.last_save.lock().await = Instant::now();
        Ok(())
    }
}

/// Writes `bytes` to `path` via the same write-tmp/fsync/rename pattern used
/// by [`JsonCollection`], for artifacts that aren't a simple string-keyed
/// map (the IOC store's two files).
pub async fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = PathBuf::from(format!("{}.tmp", path.display()));
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .map_err(|e| EdrError::Persistence(format!("creating {}: {e}", tmp_path.display())))?;
    file.write_all(bytes)
        .await
        .map_err(|e| EdrError::Persistence(format!("writing {}: {e}", tmp_path.display())))?;
    file.sync_all()
        .await
        .map_err(|e| EdrError::Persistence(format!("fsync {}: {e}", tmp_path.display())))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| EdrError::Persistence(format!("renaming into place: {e}")))?;
    Ok(())
}

/// Reads and parses `path` as JSON, recovering from a corrupted file the
/// same way [`JsonCollection::load`] does.
pub async fn load_or_recover<T: DeserializeOwned + Default>(path: &Path, label: &str) -> Result<T> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(T::default()),
        Err(err) => return Err(EdrError::Persistence(format!("reading {}: {err}", path.display()))),
    };
    match serde_json::from_str::<T>(&contents) {
        Ok(value) => Ok(value),
        Err(err) => {
            tracing::error!(%label, %err, file = %path.display(), "corrupted file, recovering");
            let corrupted = PathBuf::from(format!("{}.corrupted.{}", path.display(), now_ts()));
            tokio::fs::rename(path, &corrupted)
                .await
                .map_err(|e| EdrError::Persistence(format!("renaming corrupted file aside: {e}")))?;
            Ok(T::default())
        }
    }
}
