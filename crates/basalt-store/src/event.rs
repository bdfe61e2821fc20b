/// What happened to an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The entity was persisted for the first time.
    Created,
    /// The entity's contents changed.
    Updated,
    /// Deletion was requested, or the entity was purged.
    Deleted,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "Created",
            Self::Updated => "Updated",
            Self::Deleted => "Deleted",
        };
        write!(f, "{s}")
    }
}

/// A change notification carrying the entity as written.
#[derive(Clone, Debug)]
pub struct StoreEvent<T> {
    pub kind: EventKind,
    pub object: T,
}
