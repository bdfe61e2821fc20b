use basalt_backend::BackendError;
use basalt_registry::RegistryError;
use basalt_store::StoreError;

/// Errors from a reconciliation pass.
#[derive(Debug, thiserror::Error)]
pub enum ReconcilerError {
    /// A required configuration value is missing or malformed. Raised at
    /// construction time only, never per item.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Entity store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Volume backend failure.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Reference parsing or resolution failure.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Result alias for reconciler operations.
pub type ReconcilerResult<T> = Result<T, ReconcilerError>;
