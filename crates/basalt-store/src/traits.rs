use async_trait::async_trait;
use tokio::sync::broadcast;

use basalt_types::Object;

use crate::error::StoreResult;
use crate::event::StoreEvent;

/// Entity store with change notification.
///
/// All implementations must satisfy these invariants:
/// - IDs are unique per entity kind; `create` with an empty ID assigns one.
/// - `created_at` and `deleted_at` are store-owned. Callers cannot set or
///   clear them through `create` or `update`.
/// - Deleting an entity that still carries finalizers soft-deletes it: the
///   entity stays visible with `deleted_at` set until an `update` leaves its
///   finalizer list empty, at which point the store purges it.
/// - Every successful mutation is published to `watch` subscribers.
#[async_trait]
pub trait Store<T: Object>: Send + Sync {
    /// Fetch an entity by ID.
    async fn get(&self, id: &str) -> StoreResult<T>;

    /// All entities sorted by ID, including soft-deleted entities still
    /// awaiting finalizer removal.
    async fn list(&self) -> StoreResult<Vec<T>>;

    /// Persist a new entity, assigning an ID if none is set. Returns the
    /// entity as stored.
    async fn create(&self, object: T) -> StoreResult<T>;

    /// Replace an existing entity. Returns the entity as stored.
    async fn update(&self, object: T) -> StoreResult<T>;

    /// Request deletion. Purges immediately when no finalizers are present,
    /// otherwise marks the entity as deleting. Repeat calls are no-ops.
    async fn delete(&self, id: &str) -> StoreResult<()>;

    /// Subscribe to change events. A subscriber that falls behind observes
    /// a lag error on its receiver and should resynchronize via [`Self::list`].
    fn watch(&self) -> broadcast::Receiver<StoreEvent<T>>;
}
