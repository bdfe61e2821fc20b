use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity and lifecycle fields shared by every stored entity.
///
/// The store owns `id`, `created_at`, and `deleted_at`: the ID is assigned on
/// create when left empty, `created_at` is stamped on create, and
/// `deleted_at` is stamped on delete and never cleared afterwards. Everything
/// else belongs to whoever writes the entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Unique identifier. Leave empty on create and the store assigns one.
    #[serde(default)]
    pub id: String,

    /// Free-form key/value labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Tokens that must all be removed before a deleted entity is purged.
    #[serde(default)]
    pub finalizers: Vec<String>,

    /// When the entity was first persisted.
    #[serde(default)]
    pub created_at: DateTime<Utc>,

    /// When deletion was requested. `Some` marks the entity as deleting;
    /// it remains visible until its finalizers are gone.
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Metadata {
    /// Metadata with a caller-chosen ID and everything else defaulted.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Returns `true` if deletion has been requested for this entity.
    pub fn is_deleting(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns `true` if `finalizer` is present.
    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.iter().any(|f| f == finalizer)
    }

    /// Adds `finalizer` if absent. Returns `true` if it was added.
    pub fn add_finalizer(&mut self, finalizer: &str) -> bool {
        if self.has_finalizer(finalizer) {
            return false;
        }
        self.finalizers.push(finalizer.to_string());
        true
    }

    /// Removes `finalizer` if present. Returns `true` if it was removed.
    pub fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let before = self.finalizers.len();
        self.finalizers.retain(|f| f != finalizer);
        self.finalizers.len() != before
    }
}

/// Implemented by every entity kind so stores and reconcilers can be written
/// once and parameterized over what they hold.
pub trait Object: Clone + Send + Sync + 'static {
    /// Lowercase kind name, used in logs and error messages.
    const KIND: &'static str;

    /// Shared identity and lifecycle fields.
    fn metadata(&self) -> &Metadata;

    /// Mutable access to the shared fields.
    fn metadata_mut(&mut self) -> &mut Metadata;

    /// The entity's unique identifier.
    fn id(&self) -> &str {
        &self.metadata().id
    }
}
