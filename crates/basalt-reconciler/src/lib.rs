//! Image reconciler: converges declared volume intent on the backend.
//!
//! [`ImageReconciler`] subscribes to image and snapshot change events,
//! funnels affected image IDs through a deduplicating work queue, and runs a
//! fixed-size worker pool that drives each image through the provisioning
//! state machine:
//!
//! 1. deleting images run the deletion path (remove volume, drop finalizer);
//! 2. available images are left alone;
//! 3. everything else gets its finalizer persisted, its source reference
//!    resolved to a content-addressed snapshot, its volume created blank or
//!    cloned from the populated snapshot, limits applied, and its access
//!    descriptor published.
//!
//! Failures requeue the image with per-key exponential backoff; "snapshot
//! not populated yet" is an explicit non-failure that waits for the
//! snapshot's own Populated event instead of backing off.

pub mod config;
pub mod error;
pub mod reconciler;

pub use config::{ReconcilerConfig, DEFAULT_WORKERS};
pub use error::{ReconcilerError, ReconcilerResult};
pub use reconciler::{
    image_volume_name, snapshot_volume_name, ImageReconciler, BASE_SNAPSHOT, IMAGE_DIGEST_LABEL,
    IMAGE_FINALIZER, LIMIT_METADATA_PREFIX,
};
