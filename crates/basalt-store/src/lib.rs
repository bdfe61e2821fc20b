//! Entity store for the basalt volume provisioner.
//!
//! Persistence plus change notification behind one seam: [`Store`] offers
//! CRUD over any [`basalt_types::Object`] and a [`Store::watch`] channel
//! carrying [`StoreEvent`]s for every successful mutation. [`MemoryStore`]
//! is the in-memory implementation used by tests and single-process
//! deployments.
//!
//! # Design Rules
//!
//! - `NotFound` is a distinct variant, not a failure. Reconcilers branch on
//!   it constantly and it is never logged as an error.
//! - The store owns entity lifecycle fields: ID assignment on create,
//!   `created_at`, and `deleted_at`. Callers own everything else.
//! - Soft-delete with finalizers: `delete` marks the entity as deleting and
//!   it stays visible until an update leaves the finalizer list empty, at
//!   which point the store purges it.
//! - Subscribers that fall behind see a lag signal and resynchronize via
//!   `list`; the store never blocks on a slow subscriber.

pub mod error;
pub mod event;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use event::{EventKind, StoreEvent};
pub use memory::MemoryStore;
pub use traits::Store;
