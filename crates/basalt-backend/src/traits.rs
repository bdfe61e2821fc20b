use async_trait::async_trait;

use crate::error::BackendResult;
use crate::types::{Credentials, VolumeOptions};

/// Block-volume operations the reconciler drives.
///
/// Implementations are scoped to one storage pool and must be safe for
/// concurrent independent calls; all workers share a single instance.
/// Callers round sizes to the backend's allocation granularity before
/// provisioning.
#[async_trait]
pub trait VolumeBackend: Send + Sync {
    /// Create an empty volume of `size` bytes.
    async fn create_volume(&self, name: &str, size: u64, opts: &VolumeOptions)
        -> BackendResult<()>;

    /// Create `dst_name` as a copy-on-write clone of `src_volume` at its
    /// snapshot `src_snapshot`. The clone inherits the source's size.
    async fn clone_volume(
        &self,
        src_volume: &str,
        src_snapshot: &str,
        dst_name: &str,
        opts: &VolumeOptions,
    ) -> BackendResult<()>;

    /// Grow `name` to `size` bytes. Shrinking is rejected.
    async fn resize_volume(&self, name: &str, size: u64) -> BackendResult<()>;

    /// Remove `name` and its data. Removal of an absent volume reports
    /// `VolumeNotFound`; retry-safe callers treat that as success.
    async fn remove_volume(&self, name: &str) -> BackendResult<()>;

    /// Current size of `name` in bytes.
    async fn volume_size(&self, name: &str) -> BackendResult<u64>;

    /// Set one metadata key on `name`.
    async fn set_volume_meta(&self, name: &str, key: &str, value: &str) -> BackendResult<()>;

    /// Fetch access credentials for `entity` (`client.provisioner`).
    async fn fetch_credentials(&self, entity: &str) -> BackendResult<Credentials>;
}
