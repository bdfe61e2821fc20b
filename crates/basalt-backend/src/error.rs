use thiserror::Error;

/// Errors from volume backend operations.
#[derive(Debug, Error, Clone)]
pub enum BackendError {
    /// The named volume (or volume snapshot) does not exist.
    #[error("volume {0} not found")]
    VolumeNotFound(String),

    /// A volume with this name already exists.
    #[error("volume {0} already exists")]
    VolumeAlreadyExists(String),

    /// No credentials exist for the named entity.
    #[error("unknown backend entity: {0}")]
    UnknownEntity(String),

    /// The caller asked for something the backend cannot do.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend is temporarily unreachable or busy.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// An unclassified backend failure.
    #[error("backend error: {0}")]
    Internal(String),
}

impl BackendError {
    /// Create a [`BackendError::Unavailable`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn unavailable<E: std::fmt::Display>(e: E) -> Self {
        Self::Unavailable(e.to_string())
    }

    /// Create a [`BackendError::Internal`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }

    /// Returns `true` if this is a `VolumeNotFound` error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::VolumeNotFound(_))
    }

    /// Returns `true` if this is a `VolumeAlreadyExists` error.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::VolumeAlreadyExists(_))
    }
}

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = BackendError::VolumeNotFound("img-1".into());
        assert_eq!(err.to_string(), "volume img-1 not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn helper_constructors() {
        assert!(matches!(
            BackendError::unavailable("mon down"),
            BackendError::Unavailable(_)
        ));
        assert!(matches!(
            BackendError::internal("boom"),
            BackendError::Internal(_)
        ));
    }
}
