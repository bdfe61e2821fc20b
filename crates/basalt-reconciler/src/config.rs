use crate::error::{ReconcilerError, ReconcilerResult};

/// Workers draining the queue when none is configured.
pub const DEFAULT_WORKERS: usize = 15;

/// Tunables for [`crate::ImageReconciler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Cluster endpoints handed to consumers in the access descriptor.
    pub monitors: String,

    /// Backend entity whose credentials consumers attach with
    /// (`client.provisioner`).
    pub client: String,

    /// Storage pool that holds provisioned volumes.
    pub pool: String,

    /// Parallel workers draining the work queue.
    pub workers: usize,
}

impl ReconcilerConfig {
    pub fn new(
        monitors: impl Into<String>,
        client: impl Into<String>,
        pool: impl Into<String>,
    ) -> Self {
        Self {
            monitors: monitors.into(),
            client: client.into(),
            pool: pool.into(),
            workers: DEFAULT_WORKERS,
        }
    }

    pub(crate) fn validate(&self) -> ReconcilerResult<()> {
        if self.monitors.is_empty() {
            return Err(ReconcilerError::InvalidConfig(
                "must specify monitors".to_string(),
            ));
        }
        if self.client.is_empty() {
            return Err(ReconcilerError::InvalidConfig(
                "must specify client".to_string(),
            ));
        }
        if self.pool.is_empty() {
            return Err(ReconcilerError::InvalidConfig(
                "must specify pool".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(ReconcilerError::InvalidConfig(
                "must specify at least one worker".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self::new("", "", "")
    }
}
