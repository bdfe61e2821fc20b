//! Block-volume backend driver seam.
//!
//! [`VolumeBackend`] is what the reconciler drives: create, clone, resize,
//! and remove volumes, write per-volume metadata, and fetch access
//! credentials. [`MemoryBackend`] implements it over in-process tables for
//! tests and single-process deployments, with hooks to simulate the
//! population pipeline and inject outages; a production deployment would
//! implement the same trait over a storage cluster client.
//!
//! # Design Rules
//!
//! - `VolumeNotFound` is a distinct variant: deletion paths treat it as
//!   success and must be able to branch on it.
//! - Every operation is safe for concurrent independent use; workers share
//!   one backend instance.

pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{BackendError, BackendResult};
pub use memory::MemoryBackend;
pub use traits::VolumeBackend;
pub use types::{Credentials, VolumeOptions};
