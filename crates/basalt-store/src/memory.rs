use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use basalt_types::Object;

use crate::error::{StoreError, StoreResult};
use crate::event::{EventKind, StoreEvent};
use crate::traits::Store;

/// Events buffered per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 256;

/// In-memory, HashMap-based entity store.
///
/// Intended for tests and single-process deployments. Entities are held
/// behind a `RwLock` and cloned on read/write; change events fan out over a
/// `tokio::sync::broadcast` channel.
pub struct MemoryStore<T: Object> {
    entries: RwLock<HashMap<String, T>>,
    events: broadcast::Sender<StoreEvent<T>>,
}

impl<T: Object> MemoryStore<T> {
    /// Create a new empty store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Number of entities currently held, soft-deleted included.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    fn emit(&self, kind: EventKind, object: &T) {
        trace!(kind = %kind, entity = T::KIND, id = %object.id(), "store event");
        // Send only fails when no subscriber is listening.
        let _ = self.events.send(StoreEvent {
            kind,
            object: object.clone(),
        });
    }
}

impl<T: Object> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Object> Store<T> for MemoryStore<T> {
    async fn get(&self, id: &str) -> StoreResult<T> {
        let entries = self.entries.read().expect("lock poisoned");
        entries
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found::<T>(id))
    }

    async fn list(&self) -> StoreResult<Vec<T>> {
        let entries = self.entries.read().expect("lock poisoned");
        let mut all: Vec<T> = entries.values().cloned().collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(all)
    }

    async fn create(&self, mut object: T) -> StoreResult<T> {
        {
            let mut entries = self.entries.write().expect("lock poisoned");
            let meta = object.metadata_mut();
            if meta.id.is_empty() {
                meta.id = Uuid::now_v7().to_string();
            }
            if entries.contains_key(&meta.id) {
                return Err(StoreError::already_exists::<T>(&meta.id));
            }
            meta.created_at = Utc::now();
            meta.deleted_at = None;
            entries.insert(meta.id.clone(), object.clone());
        }
        self.emit(EventKind::Created, &object);
        Ok(object)
    }

    async fn update(&self, mut object: T) -> StoreResult<T> {
        let purged = {
            let mut entries = self.entries.write().expect("lock poisoned");
            let id = object.id().to_string();
            let stored = entries
                .get(&id)
                .ok_or_else(|| StoreError::not_found::<T>(&id))?;
            // Lifecycle fields are store-owned and survive any caller write.
            let created_at = stored.metadata().created_at;
            let deleted_at = stored.metadata().deleted_at;
            let meta = object.metadata_mut();
            meta.created_at = created_at;
            meta.deleted_at = deleted_at;
            if meta.is_deleting() && meta.finalizers.is_empty() {
                entries.remove(&id);
                true
            } else {
                entries.insert(id, object.clone());
                false
            }
        };
        if purged {
            self.emit(EventKind::Deleted, &object);
        } else {
            self.emit(EventKind::Updated, &object);
        }
        Ok(object)
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let event = {
            let mut entries = self.entries.write().expect("lock poisoned");
            let stored = entries
                .get_mut(id)
                .ok_or_else(|| StoreError::not_found::<T>(id))?;
            if stored.metadata().is_deleting() {
                // Deletion already requested; nothing new to record.
                None
            } else if stored.metadata().finalizers.is_empty() {
                stored.metadata_mut().deleted_at = Some(Utc::now());
                let object = stored.clone();
                entries.remove(id);
                Some(object)
            } else {
                stored.metadata_mut().deleted_at = Some(Utc::now());
                Some(stored.clone())
            }
        };
        if let Some(object) = event {
            self.emit(EventKind::Deleted, &object);
        }
        Ok(())
    }

    fn watch(&self) -> broadcast::Receiver<StoreEvent<T>> {
        self.events.subscribe()
    }
}

impl<T: Object> std::fmt::Debug for MemoryStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entity", &T::KIND)
            .field("entry_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use basalt_types::{Image, ImageSpec, Metadata};

    use super::*;

    fn image_with_id(id: &str) -> Image {
        let mut image = Image::new(ImageSpec::default());
        image.metadata = Metadata::with_id(id);
        image
    }

    // -----------------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn create_assigns_id_when_empty() {
        let store = MemoryStore::<Image>::new();
        let stored = store.create(Image::default()).await.unwrap();
        assert!(!stored.id().is_empty());
        assert_eq!(store.get(stored.id()).await.unwrap().id(), stored.id());
    }

    #[tokio::test]
    async fn create_keeps_explicit_id() {
        let store = MemoryStore::<Image>::new();
        let stored = store.create(image_with_id("img-1")).await.unwrap();
        assert_eq!(stored.id(), "img-1");
    }

    #[tokio::test]
    async fn create_duplicate_is_already_exists() {
        let store = MemoryStore::<Image>::new();
        store.create(image_with_id("img-1")).await.unwrap();
        let err = store.create(image_with_id("img-1")).await.unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn create_stamps_lifecycle_fields() {
        let store = MemoryStore::<Image>::new();
        let mut image = image_with_id("img-1");
        image.metadata.deleted_at = Some(Utc::now());
        let stored = store.create(image).await.unwrap();
        assert!(stored.metadata.deleted_at.is_none());
        assert!(stored.metadata.created_at > chrono::DateTime::<Utc>::default());
    }

    #[tokio::test]
    async fn concurrent_create_converges_to_one_winner() {
        let store = Arc::new(MemoryStore::<Image>::new());
        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.create(image_with_id("img-1")).await })
            })
            .collect();
        let mut oks = 0;
        let mut dups = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => oks += 1,
                Err(e) if e.is_already_exists() => dups += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((oks, dups), (1, 1));
        assert_eq!(store.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Get / List
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = MemoryStore::<Image>::new();
        let err = store.get("absent").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_is_sorted_by_id() {
        let store = MemoryStore::<Image>::new();
        for id in ["img-c", "img-a", "img-b"] {
            store.create(image_with_id(id)).await.unwrap();
        }
        let ids: Vec<_> = store
            .list()
            .await
            .unwrap()
            .iter()
            .map(|i| i.id().to_string())
            .collect();
        assert_eq!(ids, vec!["img-a", "img-b", "img-c"]);
    }

    // -----------------------------------------------------------------------
    // Update
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let store = MemoryStore::<Image>::new();
        let err = store.update(image_with_id("absent")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn update_replaces_spec_and_status() {
        let store = MemoryStore::<Image>::new();
        let mut image = store.create(image_with_id("img-1")).await.unwrap();
        image.spec.size = 42;
        store.update(image).await.unwrap();
        assert_eq!(store.get("img-1").await.unwrap().spec.size, 42);
    }

    #[tokio::test]
    async fn update_cannot_resurrect_deleting_entity() {
        let store = MemoryStore::<Image>::new();
        let mut image = image_with_id("img-1");
        image.metadata.add_finalizer("volume");
        let mut image = store.create(image).await.unwrap();
        store.delete("img-1").await.unwrap();

        image.metadata.deleted_at = None;
        let stored = store.update(image).await.unwrap();
        assert!(stored.metadata.is_deleting());
        assert!(store.get("img-1").await.unwrap().metadata.is_deleting());
    }

    #[tokio::test]
    async fn update_preserves_created_at() {
        let store = MemoryStore::<Image>::new();
        let created = store.create(image_with_id("img-1")).await.unwrap();
        let mut tampered = created.clone();
        tampered.metadata.created_at = chrono::DateTime::<Utc>::default();
        let stored = store.update(tampered).await.unwrap();
        assert_eq!(stored.metadata.created_at, created.metadata.created_at);
    }

    // -----------------------------------------------------------------------
    // Delete / finalizers / purge
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn delete_without_finalizers_purges() {
        let store = MemoryStore::<Image>::new();
        store.create(image_with_id("img-1")).await.unwrap();
        store.delete("img-1").await.unwrap();
        assert!(store.get("img-1").await.unwrap_err().is_not_found());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn delete_with_finalizer_soft_deletes() {
        let store = MemoryStore::<Image>::new();
        let mut image = image_with_id("img-1");
        image.metadata.add_finalizer("volume");
        store.create(image).await.unwrap();

        store.delete("img-1").await.unwrap();
        let stored = store.get("img-1").await.unwrap();
        assert!(stored.metadata.is_deleting());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn repeated_delete_is_noop() {
        let store = MemoryStore::<Image>::new();
        let mut image = image_with_id("img-1");
        image.metadata.add_finalizer("volume");
        store.create(image).await.unwrap();

        store.delete("img-1").await.unwrap();
        let mut rx = store.watch();
        store.delete("img-1").await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn removing_last_finalizer_purges_deleting_entity() {
        let store = MemoryStore::<Image>::new();
        let mut image = image_with_id("img-1");
        image.metadata.add_finalizer("volume");
        store.create(image).await.unwrap();
        store.delete("img-1").await.unwrap();

        let mut stored = store.get("img-1").await.unwrap();
        stored.metadata.remove_finalizer("volume");
        store.update(stored).await.unwrap();
        assert!(store.get("img-1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn removing_finalizer_on_live_entity_keeps_it() {
        let store = MemoryStore::<Image>::new();
        let mut image = image_with_id("img-1");
        image.metadata.add_finalizer("volume");
        let mut stored = store.create(image).await.unwrap();

        stored.metadata.remove_finalizer("volume");
        store.update(stored).await.unwrap();
        assert!(store.get("img-1").await.is_ok());
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn mutations_emit_events_in_order() {
        let store = MemoryStore::<Image>::new();
        let mut rx = store.watch();

        let mut image = store.create(image_with_id("img-1")).await.unwrap();
        image.spec.size = 1;
        store.update(image).await.unwrap();
        store.delete("img-1").await.unwrap();

        let kinds: Vec<_> = (0..3).map(|_| rx.try_recv().unwrap().kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Created, EventKind::Updated, EventKind::Deleted]
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn soft_delete_emits_deleted() {
        let store = MemoryStore::<Image>::new();
        let mut image = image_with_id("img-1");
        image.metadata.add_finalizer("volume");
        store.create(image).await.unwrap();

        let mut rx = store.watch();
        store.delete("img-1").await.unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, EventKind::Deleted);
        assert!(event.object.metadata.is_deleting());
    }

    #[tokio::test]
    async fn purge_via_update_emits_deleted() {
        let store = MemoryStore::<Image>::new();
        let mut image = image_with_id("img-1");
        image.metadata.add_finalizer("volume");
        store.create(image).await.unwrap();
        store.delete("img-1").await.unwrap();

        let mut rx = store.watch();
        let mut stored = store.get("img-1").await.unwrap();
        stored.metadata.remove_finalizer("volume");
        store.update(stored).await.unwrap();
        assert_eq!(rx.try_recv().unwrap().kind, EventKind::Deleted);
    }
}
