use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{RegistryError, RegistryResult};
use crate::reference::{Digest, ImageRef};

/// Content identity of a resolved reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub digest: Digest,
}

/// Resolves a symbolic image reference to stable content identity.
#[async_trait]
pub trait ContentResolver: Send + Sync {
    /// Resolve `image_ref` to its content digest.
    ///
    /// Resolution must be stable while the reference's upstream content is
    /// unchanged: the digest is the dedup key for snapshots.
    async fn resolve(&self, image_ref: &ImageRef) -> RegistryResult<ResolvedImage>;
}

/// Fixed reference-to-digest table.
///
/// Used by tests and single-process deployments. References that already
/// pin a digest resolve to it without a table lookup; everything else must
/// have been inserted, exactly as written, or resolution fails.
pub struct StaticResolver {
    entries: RwLock<HashMap<String, Digest>>,
}

impl StaticResolver {
    /// An empty table.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Map `image_ref`, exactly as written, to `digest`.
    pub fn insert(&self, image_ref: impl Into<String>, digest: Digest) {
        self.entries
            .write()
            .expect("lock poisoned")
            .insert(image_ref.into(), digest);
    }
}

impl Default for StaticResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentResolver for StaticResolver {
    async fn resolve(&self, image_ref: &ImageRef) -> RegistryResult<ResolvedImage> {
        if let Some(digest) = image_ref.digest() {
            return Ok(ResolvedImage {
                digest: digest.clone(),
            });
        }
        let entries = self.entries.read().expect("lock poisoned");
        entries
            .get(&image_ref.to_string())
            .cloned()
            .map(|digest| ResolvedImage { digest })
            .ok_or_else(|| RegistryError::Unresolved(image_ref.to_string()))
    }
}
