use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("reconciler error: {0}")]
    Reconciler(#[from] basalt_reconciler::ReconcilerError),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
