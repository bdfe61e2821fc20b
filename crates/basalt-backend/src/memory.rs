use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{BackendError, BackendResult};
use crate::traits::VolumeBackend;
use crate::types::{Credentials, VolumeOptions};

/// One volume as the in-memory backend sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeRecord {
    pub size: u64,
    pub meta: BTreeMap<String, String>,
    /// `(src_volume, src_snapshot)` when this volume is a clone.
    pub cloned_from: Option<(String, String)>,
    /// Snapshot tags present on this volume.
    pub snapshots: Vec<String>,
}

/// In-memory volume backend.
///
/// Implements [`VolumeBackend`] over plain tables for tests and
/// single-process deployments. Inherent methods cover what the trait leaves
/// to other actors: seeding credentials, adding snapshot tags the way the
/// population pipeline would, injecting outages, and inspecting state.
pub struct MemoryBackend {
    volumes: RwLock<HashMap<String, VolumeRecord>>,
    credentials: RwLock<HashMap<String, String>>,
    unavailable: AtomicBool,
    mutating_calls: AtomicU64,
}

impl MemoryBackend {
    /// An empty backend with no volumes and no credentials.
    pub fn new() -> Self {
        Self {
            volumes: RwLock::new(HashMap::new()),
            credentials: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            mutating_calls: AtomicU64::new(0),
        }
    }

    /// Register credentials for `entity`.
    pub fn set_credentials(&self, entity: impl Into<String>, key: impl Into<String>) {
        self.credentials
            .write()
            .expect("lock poisoned")
            .insert(entity.into(), key.into());
    }

    /// Add snapshot tag `snapshot` to `volume`, as the population pipeline
    /// does once a snapshot volume's content is fully written.
    pub fn add_snapshot(&self, volume: &str, snapshot: &str) -> BackendResult<()> {
        let mut volumes = self.volumes.write().expect("lock poisoned");
        let record = volumes
            .get_mut(volume)
            .ok_or_else(|| BackendError::VolumeNotFound(volume.to_string()))?;
        if !record.snapshots.iter().any(|s| s == snapshot) {
            record.snapshots.push(snapshot.to_string());
        }
        Ok(())
    }

    /// While set, every operation fails with [`BackendError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Number of mutating calls (create, clone, resize, remove, metadata)
    /// attempted so far.
    pub fn mutating_calls(&self) -> u64 {
        self.mutating_calls.load(Ordering::Relaxed)
    }

    /// Snapshot of one volume's record, if present.
    pub fn volume(&self, name: &str) -> Option<VolumeRecord> {
        self.volumes
            .read()
            .expect("lock poisoned")
            .get(name)
            .cloned()
    }

    /// Returns `true` if `name` exists.
    pub fn contains_volume(&self, name: &str) -> bool {
        self.volumes
            .read()
            .expect("lock poisoned")
            .contains_key(name)
    }

    /// Number of volumes held.
    pub fn volume_count(&self) -> usize {
        self.volumes.read().expect("lock poisoned").len()
    }

    fn check_available(&self) -> BackendResult<()> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(BackendError::Unavailable("injected outage".to_string()));
        }
        Ok(())
    }

    fn count_mutation(&self) {
        self.mutating_calls.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VolumeBackend for MemoryBackend {
    async fn create_volume(
        &self,
        name: &str,
        size: u64,
        _opts: &VolumeOptions,
    ) -> BackendResult<()> {
        self.check_available()?;
        self.count_mutation();
        let mut volumes = self.volumes.write().expect("lock poisoned");
        if volumes.contains_key(name) {
            return Err(BackendError::VolumeAlreadyExists(name.to_string()));
        }
        volumes.insert(
            name.to_string(),
            VolumeRecord {
                size,
                ..VolumeRecord::default()
            },
        );
        debug!(volume = name, size, "created volume");
        Ok(())
    }

    async fn clone_volume(
        &self,
        src_volume: &str,
        src_snapshot: &str,
        dst_name: &str,
        _opts: &VolumeOptions,
    ) -> BackendResult<()> {
        self.check_available()?;
        self.count_mutation();
        let mut volumes = self.volumes.write().expect("lock poisoned");
        let src = volumes
            .get(src_volume)
            .ok_or_else(|| BackendError::VolumeNotFound(src_volume.to_string()))?;
        if !src.snapshots.iter().any(|s| s == src_snapshot) {
            return Err(BackendError::VolumeNotFound(format!(
                "{src_volume}@{src_snapshot}"
            )));
        }
        if volumes.contains_key(dst_name) {
            return Err(BackendError::VolumeAlreadyExists(dst_name.to_string()));
        }
        let size = src.size;
        volumes.insert(
            dst_name.to_string(),
            VolumeRecord {
                size,
                cloned_from: Some((src_volume.to_string(), src_snapshot.to_string())),
                ..VolumeRecord::default()
            },
        );
        debug!(
            src = src_volume,
            snapshot = src_snapshot,
            volume = dst_name,
            "cloned volume"
        );
        Ok(())
    }

    async fn resize_volume(&self, name: &str, size: u64) -> BackendResult<()> {
        self.check_available()?;
        self.count_mutation();
        let mut volumes = self.volumes.write().expect("lock poisoned");
        let record = volumes
            .get_mut(name)
            .ok_or_else(|| BackendError::VolumeNotFound(name.to_string()))?;
        if size < record.size {
            return Err(BackendError::InvalidArgument(format!(
                "cannot shrink volume {name} from {} to {size}",
                record.size
            )));
        }
        record.size = size;
        debug!(volume = name, size, "resized volume");
        Ok(())
    }

    async fn remove_volume(&self, name: &str) -> BackendResult<()> {
        self.check_available()?;
        self.count_mutation();
        let mut volumes = self.volumes.write().expect("lock poisoned");
        if volumes.remove(name).is_none() {
            return Err(BackendError::VolumeNotFound(name.to_string()));
        }
        debug!(volume = name, "removed volume");
        Ok(())
    }

    async fn volume_size(&self, name: &str) -> BackendResult<u64> {
        self.check_available()?;
        let volumes = self.volumes.read().expect("lock poisoned");
        volumes
            .get(name)
            .map(|record| record.size)
            .ok_or_else(|| BackendError::VolumeNotFound(name.to_string()))
    }

    async fn set_volume_meta(&self, name: &str, key: &str, value: &str) -> BackendResult<()> {
        self.check_available()?;
        self.count_mutation();
        let mut volumes = self.volumes.write().expect("lock poisoned");
        let record = volumes
            .get_mut(name)
            .ok_or_else(|| BackendError::VolumeNotFound(name.to_string()))?;
        record.meta.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn fetch_credentials(&self, entity: &str) -> BackendResult<Credentials> {
        self.check_available()?;
        let credentials = self.credentials.read().expect("lock poisoned");
        credentials
            .get(entity)
            .map(|key| Credentials {
                user: entity.to_string(),
                key: key.clone(),
            })
            .ok_or_else(|| BackendError::UnknownEntity(entity.to_string()))
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("volume_count", &self.volume_count())
            .finish()
    }
}
