use serde::{Deserialize, Serialize};

use crate::metadata::{Metadata, Object};

/// A content-addressed base snapshot that cloned volumes are created from.
///
/// The snapshot's ID is the content digest of the image it was populated
/// from, so any number of images resolving to the same content share one
/// snapshot. Population itself (pulling the image and writing it into the
/// backing volume) is an external pipeline; the reconciler only creates the
/// entity and waits for [`SnapshotState::Populated`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub metadata: Metadata,
    pub source: SnapshotSource,
    pub status: SnapshotStatus,
}

impl Object for Snapshot {
    const KIND: &'static str = "snapshot";

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Where the snapshot's content comes from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSource {
    /// Canonical `locator@digest` reference the snapshot is populated from.
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotStatus {
    #[serde(default)]
    pub state: SnapshotState,
}

/// Population lifecycle of a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotState {
    /// Entity exists but its content has not been written yet.
    #[default]
    Pending,
    /// Content is fully written; clones may be taken.
    Populated,
}
