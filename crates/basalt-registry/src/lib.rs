//! Image reference parsing and content-digest resolution.
//!
//! Volumes provisioned from a source image name it symbolically
//! (`host/repo/name[:tag][@algorithm:hex]`). [`ImageRef::parse`] validates
//! and decomposes that form; [`ContentResolver`] turns a reference into the
//! stable [`Digest`] that keys snapshot dedup. [`StaticResolver`] is the
//! table-backed implementation for tests and single-process deployments; a
//! production deployment would back the same trait with a registry client.

pub mod error;
pub mod reference;
pub mod resolver;

pub use error::{RegistryError, RegistryResult};
pub use reference::{Digest, ImageRef};
pub use resolver::{ContentResolver, ResolvedImage, StaticResolver};
