use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::metadata::{Metadata, Object};

/// Declared intent and observed state for one provisioned block volume.
///
/// Consumers write the `spec`; the reconciler converges the backend on it and
/// reports back through `status`. An image whose spec names a source image
/// reference is cloned from a content-addressed [`crate::Snapshot`], otherwise
/// it is created blank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub metadata: Metadata,
    pub spec: ImageSpec,
    pub status: ImageStatus,
}

impl Image {
    /// An image with the given spec and empty metadata. The store assigns the
    /// ID when the image is created.
    pub fn new(spec: ImageSpec) -> Self {
        Self {
            metadata: Metadata::default(),
            spec,
            status: ImageStatus::default(),
        }
    }
}

impl Object for Image {
    const KIND: &'static str = "image";

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// What the volume should look like.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageSpec {
    /// Source image reference (`host/repo/name[:tag][@digest]`). Empty means
    /// the volume is created blank.
    #[serde(default)]
    pub image: String,

    /// ID of the snapshot this volume is cloned from. Owned by the
    /// reconciler: set at most once, never cleared.
    #[serde(default)]
    pub snapshot_ref: Option<String>,

    /// Requested size in bytes. Rounded up to the backend's allocation
    /// granularity when provisioned.
    #[serde(default)]
    pub size: u64,

    /// Backend tuning limits, persisted as volume metadata.
    #[serde(default)]
    pub limits: BTreeMap<String, i64>,
}

/// What the reconciler has observed and provisioned so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageStatus {
    #[serde(default)]
    pub state: ImageState,

    /// Populated once the volume is ready for consumers.
    #[serde(default)]
    pub access: Option<ImageAccess>,
}

/// Provisioning lifecycle of an image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageState {
    /// Declared but not yet fully provisioned.
    #[default]
    Pending,
    /// Volume exists, is sized, and its access descriptor is published.
    Available,
}

/// Everything a consumer needs to attach the provisioned volume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageAccess {
    /// Cluster endpoints, as handed out by the backend.
    pub monitors: String,

    /// `pool/<volume>` locator within the cluster.
    pub handle: String,

    /// Backend user the consumer authenticates as, without its type prefix.
    pub user: String,

    /// Secret key for `user`.
    pub user_key: String,

    /// World-wide name uniquely identifying the block device.
    pub wwn: String,
}
