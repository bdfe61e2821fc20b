//! Single-process volume provider.
//!
//! Wires the basalt subsystems into one embeddable unit: in-memory entity
//! stores, the development [`basalt_backend::MemoryBackend`], a static
//! content resolver, and the image reconciler, behind a start/shutdown
//! lifecycle. The `basaltd` binary is a thin flags-and-signals wrapper
//! around [`Provider`].
//!
//! Production deployments swap the backend and resolver for cluster-backed
//! implementations of the same traits; everything else is unchanged.

pub mod config;
pub mod error;
pub mod provider;

pub use config::ProviderConfig;
pub use error::{ProviderError, ProviderResult};
pub use provider::Provider;
