//! Entity model for the basalt volume provisioner.
//!
//! This crate defines the declarative entities the reconciler converges on
//! and the shared identity fields every entity carries. Every other basalt
//! crate depends on `basalt-types`.
//!
//! # Key Types
//!
//! - [`Metadata`] — Identity and lifecycle fields shared by every entity
//! - [`Object`] — Trait tying an entity kind to its metadata, so stores stay generic
//! - [`Image`] — Declared volume intent plus observed provisioning state
//! - [`Snapshot`] — Content-addressed base snapshot, deduplicated by digest
//! - [`ImageAccess`] — Everything a consumer needs to attach a provisioned volume
//! - [`WwnGenerator`] — World-wide name generation for block devices

pub mod image;
pub mod metadata;
pub mod size;
pub mod snapshot;
pub mod wwn;

pub use image::{Image, ImageAccess, ImageSpec, ImageState, ImageStatus};
pub use metadata::{Metadata, Object};
pub use snapshot::{Snapshot, SnapshotSource, SnapshotState, SnapshotStatus};
pub use wwn::WwnGenerator;
