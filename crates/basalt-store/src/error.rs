use basalt_types::Object;

/// Errors from entity store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// An entity with this ID already exists.
    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    /// The backing store failed.
    #[error("store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// A `NotFound` for the given entity kind.
    pub fn not_found<T: Object>(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: T::KIND,
            id: id.into(),
        }
    }

    /// An `AlreadyExists` for the given entity kind.
    pub fn already_exists<T: Object>(id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind: T::KIND,
            id: id.into(),
        }
    }

    /// Returns `true` if this is a `NotFound` error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is an `AlreadyExists` error.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
