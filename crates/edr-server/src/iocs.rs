//! Versioned IOC (Indicators of Compromise) store: three maps (ips,
//! file_hashes, urls), explicit `commit_version()` as the sole producer of
//! version bumps, sha256 integrity hash over the serialized maps.
//!
//! A fourth category, "process names", appears in one variant of the system
//! this control plane descends from but is excluded here until its wire
//! schema stabilizes.

use std::path::{Path, PathBuf};

use edr_shared::{now_ts, EdrError, HashType, IocEntry, IocMaps, IocVersion, Result, Severity};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock};

use crate::persistence::{atomic_write, load_or_recover};
use crate::telemetry::metrics;

pub enum IocKind {
    Ip,
    FileHash,
    Url,
}

pub struct IocStore {
    iocs_path: PathBuf,
    version_path: PathBuf,
    maps: RwLock<IocMaps>,
    version: RwLock<IocVersion>,
    dirty: Mutex<bool>,
}

impl IocStore {
    pub async fn load(dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| EdrError::Persistence(format!("creating iocs dir: {e}")))?;
        let iocs_path = dir.join("iocs.json");
        let version_path = dir.join("version.json");
        let maps: IocMaps = load_or_recover(&iocs_path, "iocs").await?;
        let version: IocVersion = load_or_recover(&version_path, "ioc-version").await?;
        Ok(Self {
            iocs_path,
            version_path,
            maps: RwLock::new(maps),
            version: RwLock::new(version),
            dirty: Mutex::new(false),
        })
    }

    pub fn validate_ip(value: &str) -> Result<()> {
        let octets: Vec<&str> = value.split('.').collect();
        if octets.len() != 4 || !octets.iter().all(|o| o.parse::<u8>().is_ok()) {
            return Err(EdrError::Validation(format!("invalid IPv4 address: {value}")));
        }
        Ok(())
    }

    pub fn validate_hash(value: &str, hash_type: HashType) -> Result<()> {
        let expected_len = match hash_type {
            HashType::Md5 => 32,
            HashType::Sha1 => 40,
            HashType::Sha256 => 64,
        };
        if value.len() != expected_len || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(EdrError::Validation(format!(
                "invalid {hash_type:?} hash: expected {expected_len} hex chars"
            )));
        }
        Ok(())
    }

    pub async fn add_ip(&self, value: &str, description: String, severity: Severity) -> Result<()> {
        Self::validate_ip(value)?;
        let entry = IocEntry {
            added_at: now_ts(),
            description,
            severity,
            hash_type: None,
        };
        self.maps.write().await.ips.insert(value.to_string(), entry);
        *self.dirty.lock().await = true;
        Ok(())
    }

    pub async fn add_hash(
        &self,
        value: &str,
        hash_type: HashType,
        description: String,
        severity: Severity,
    ) -> Result<()> {
        Self::validate_hash(value, hash_type)?;
        let normalized = value.to_lowercase();
        let entry = IocEntry {
            added_at: now_ts(),
            description,
            severity,
            hash_type: Some(hash_type),
        };
        self.maps.write().await.file_hashes.insert(normalized, entry);
        *self.dirty.lock().await = true;
        Ok(())
    }

    pub async fn add_url(&self, value: &str, description: String, severity: Severity) -> Result<()> {
        let normalized = value.to_lowercase();
        let entry = IocEntry {
            added_at: now_ts(),
            description,
            severity,
            hash_type: None,
        };
        self.maps.write().await.urls.insert(normalized, entry);
        *self.dirty.lock().await = true;
        Ok(())
    }

    pub async fn remove(&self, kind: &IocKind, value: &str) -> Result<bool> {
        let key = value.to_lowercase();
        let mut maps = self.maps.write().await;
        let removed = match kind {
            IocKind::Ip => maps.ips.remove(&key),
            IocKind::FileHash => maps.file_hashes.remove(&key),
            IocKind::Url => maps.urls.remove(&key),
        }
        .is_some();
        if removed {
            *self.dirty.lock().await = true;
        }
        Ok(removed)
    }

    /// The sole producer of version increments: if dirty, serializes the
    /// maps, bumps `version` by exactly one, recomputes the sha256 over the
    /// serialized bytes, and persists both files atomically.
    pub async fn commit_version(&self) -> Result<u64> {
        if !*self.dirty.lock().await {
            return Ok(self.version.read().await.version);
        }
        let maps_snapshot = self.maps.read().await.clone();
        let bytes = serde_json::to_vec_pretty(&maps_snapshot)
            .map_err(|e| EdrError::Persistence(format!("serializing iocs: {e}")))?;
        let hash = hex_sha256(&bytes);

        let mut version = self.version.write().await;
        version.version += 1;
        version.updated_at = now_ts();
        version.hash = hash;

        atomic_write(&self.iocs_path, &bytes).await?;
        let version_bytes = serde_json::to_vec_pretty(&*version)
            .map_err(|e| EdrError::Persistence(format!("serializing ioc version: {e}")))?;
        atomic_write(&self.version_path, &version_bytes).await?;

        *self.dirty.lock().await = false;
        metrics().ioc_version.set(version.version as i64);
        Ok(version.version)
    }

    pub async fn snapshot(&self) -> (IocMaps, u64) {
        let maps = self.maps.read().await.clone();
        let version = self.version.read().await.version;
        (maps, version)
    }

    pub async fn version(&self) -> u64 {
        self.version.read().await.version
    }

    /// Bulk-imports entries through the same validated mutation paths as
    /// `add_ip`/`add_hash`/`add_url`, without committing a version.
    pub async fn import_bulk(&self, maps: IocMaps) -> Result<()> {
        for (ip, entry) in maps.ips {
            self.add_ip(&ip, entry.description, entry.severity).await?;
        }
        for (hash, entry) in maps.file_hashes {
            let hash_type = entry.hash_type.ok_or_else(|| {
                EdrError::Validation(format!("file hash {hash} missing hash_type on import"))
            })?;
            self.add_hash(&hash, hash_type, entry.description, entry.severity)
                .await?;
        }
        for (url, entry) in maps.urls {
            self.add_url(&url, entry.description, entry.severity).await?;
        }
        Ok(())
    }

    pub async fn export_snapshot_to_writer<W: std::io::Write>(&self, writer: W) -> Result<()> {
        let (maps, _version) = self.snapshot().await;
        serde_json::to_writer_pretty(writer, &maps)
            .map_err(|e| EdrError::Persistence(format!("exporting iocs: {e}")))
    }
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
