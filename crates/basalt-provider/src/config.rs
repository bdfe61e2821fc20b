use std::path::Path;

use serde::{Deserialize, Serialize};

use basalt_reconciler::{ReconcilerConfig, DEFAULT_WORKERS};

use crate::error::ProviderResult;

/// Deployment configuration for [`crate::Provider`].
///
/// Every field has a single-node development default, so a bare `basaltd`
/// starts without a configuration file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Cluster endpoints handed to volume consumers.
    pub monitors: String,

    /// Backend entity whose credentials consumers attach with.
    pub client: String,

    /// Storage pool that holds provisioned volumes.
    pub pool: String,

    /// Parallel reconciliation workers.
    pub workers: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            monitors: "127.0.0.1:6789".to_string(),
            client: "client.admin".to_string(),
            pool: "rbd".to_string(),
            workers: DEFAULT_WORKERS,
        }
    }
}

impl ProviderConfig {
    /// Load configuration from a TOML file. Missing keys keep their
    /// defaults.
    pub fn load(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub(crate) fn reconciler(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            monitors: self.monitors.clone(),
            client: self.client.clone(),
            pool: self.pool.clone(),
            workers: self.workers,
        }
    }
}
