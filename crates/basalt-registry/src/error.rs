use thiserror::Error;

/// Errors from reference parsing and resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The reference string does not follow `locator[:tag][@digest]`.
    #[error("invalid image reference {reference:?}: {reason}")]
    InvalidReference { reference: String, reason: String },

    /// The digest string does not follow `algorithm:hex`.
    #[error("invalid digest {digest:?}: {reason}")]
    InvalidDigest { digest: String, reason: String },

    /// The resolver has no content for this reference.
    #[error("unresolved image reference: {0}")]
    Unresolved(String),

    /// The resolver itself failed.
    #[error("registry error: {0}")]
    Internal(String),
}

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
