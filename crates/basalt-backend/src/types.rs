/// Placement options applied when creating or cloning a volume.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeOptions {
    /// Pool holding the volume's data blocks when it differs from the pool
    /// holding its metadata.
    pub data_pool: Option<String>,
}

/// Backend access credentials for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Entity name exactly as the backend knows it, prefix included
    /// (`client.provisioner`).
    pub user: String,

    /// Secret key for `user`.
    pub key: String,
}
