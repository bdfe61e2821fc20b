use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use basalt_backend::{MemoryBackend, VolumeBackend};
use basalt_reconciler::ImageReconciler;
use basalt_registry::{ContentResolver, StaticResolver};
use basalt_store::{MemoryStore, Store};
use basalt_types::{Image, Snapshot};

use crate::config::ProviderConfig;
use crate::error::ProviderResult;

/// Single-process volume provider.
///
/// Owns one instance of every subsystem and the reconciler that drives
/// them. Embedders create and delete entities through [`Provider::images`]
/// and watch the reconciler converge them; [`Provider::backend`] and
/// [`Provider::resolver`] expose the development implementations for
/// seeding credentials, digests, and snapshot content.
///
/// Shutdown is terminal: a stopped provider does not restart.
pub struct Provider {
    images: Arc<MemoryStore<Image>>,
    snapshots: Arc<MemoryStore<Snapshot>>,
    backend: Arc<MemoryBackend>,
    resolver: Arc<StaticResolver>,
    reconciler: Arc<ImageReconciler>,
    shutdown: watch::Sender<bool>,
    runner: Mutex<Option<JoinHandle<()>>>,
}

impl Provider {
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        let images = Arc::new(MemoryStore::new());
        let snapshots = Arc::new(MemoryStore::new());
        let backend = Arc::new(MemoryBackend::new());
        let resolver = Arc::new(StaticResolver::new());
        let reconciler = Arc::new(ImageReconciler::new(
            Arc::clone(&images) as Arc<dyn Store<Image>>,
            Arc::clone(&snapshots) as Arc<dyn Store<Snapshot>>,
            Arc::clone(&resolver) as Arc<dyn ContentResolver>,
            Arc::clone(&backend) as Arc<dyn VolumeBackend>,
            config.reconciler(),
        )?);
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            images,
            snapshots,
            backend,
            resolver,
            reconciler,
            shutdown,
            runner: Mutex::new(None),
        })
    }

    /// Start the reconciler. Idempotent; a second call is a no-op.
    pub fn start(&self) {
        let mut runner = self.runner.lock().expect("lock poisoned");
        if runner.is_some() {
            warn!("provider already started");
            return;
        }
        let handle = tokio::spawn(Arc::clone(&self.reconciler).run(self.shutdown.subscribe()));
        *runner = Some(handle);
        info!("provider started");
    }

    /// Stop the reconciler: signal shutdown, let the queue drain, and wait
    /// for every in-flight reconciliation to finish.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let runner = self.runner.lock().expect("lock poisoned").take();
        if let Some(runner) = runner {
            let _ = runner.await;
        }
        info!("provider stopped");
    }

    pub fn images(&self) -> Arc<MemoryStore<Image>> {
        Arc::clone(&self.images)
    }

    pub fn snapshots(&self) -> Arc<MemoryStore<Snapshot>> {
        Arc::clone(&self.snapshots)
    }

    pub fn backend(&self) -> Arc<MemoryBackend> {
        Arc::clone(&self.backend)
    }

    pub fn resolver(&self) -> Arc<StaticResolver> {
        Arc::clone(&self.resolver)
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::time::Duration;

    use basalt_backend::VolumeOptions;
    use basalt_reconciler::{snapshot_volume_name, BASE_SNAPSHOT};
    use basalt_registry::Digest;
    use basalt_types::{ImageSpec, ImageState, SnapshotState};

    use super::*;

    const DIGEST: &str = "sha256:b5bb9d8014a0f9b1d61e21e796d78dccdf1352f23cd32812f4850b878ae4944c";
    const GIB: u64 = 1 << 30;

    fn provider() -> Provider {
        let provider = Provider::new(ProviderConfig::default()).unwrap();
        provider.backend().set_credentials("client.admin", "sekret");
        provider
    }

    async fn wait_until<F, Fut>(what: &str, mut condition: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while tokio::time::Instant::now() < deadline {
            if condition().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {what}");
    }

    #[tokio::test]
    async fn blank_image_end_to_end() {
        let p = provider();
        p.start();

        let image = p
            .images()
            .create(Image::new(ImageSpec {
                size: GIB,
                ..ImageSpec::default()
            }))
            .await
            .unwrap();
        let id = image.metadata.id.clone();

        let images = p.images();
        let wanted = id.clone();
        wait_until("image available", move || {
            let images = Arc::clone(&images);
            let id = wanted.clone();
            async move {
                matches!(
                    images.get(&id).await,
                    Ok(image) if image.status.state == ImageState::Available
                )
            }
        })
        .await;

        let stored = p.images().get(&id).await.unwrap();
        let access = stored.status.access.unwrap();
        assert_eq!(access.user, "admin");
        assert_eq!(access.handle, format!("rbd/{id}"));

        p.shutdown().await;
    }

    #[tokio::test]
    async fn source_image_end_to_end() {
        let p = provider();
        p.resolver()
            .insert("registry.example/os/base:v1", Digest::parse(DIGEST).unwrap());
        p.start();

        let image = p
            .images()
            .create(Image::new(ImageSpec {
                image: "registry.example/os/base:v1".to_string(),
                size: 2 * GIB,
                ..ImageSpec::default()
            }))
            .await
            .unwrap();
        let id = image.metadata.id.clone();

        let snapshots = p.snapshots();
        wait_until("snapshot entity created", move || {
            let snapshots = Arc::clone(&snapshots);
            async move { snapshots.get(DIGEST).await.is_ok() }
        })
        .await;

        // Population pipeline stand-in.
        let volume = snapshot_volume_name(DIGEST);
        p.backend()
            .create_volume(&volume, GIB, &VolumeOptions::default())
            .await
            .unwrap();
        p.backend().add_snapshot(&volume, BASE_SNAPSHOT).unwrap();
        let mut snapshot = p.snapshots().get(DIGEST).await.unwrap();
        snapshot.status.state = SnapshotState::Populated;
        p.snapshots().update(snapshot).await.unwrap();

        let images = p.images();
        let wanted = id.clone();
        wait_until("image available", move || {
            let images = Arc::clone(&images);
            let id = wanted.clone();
            async move {
                matches!(
                    images.get(&id).await,
                    Ok(image) if image.status.state == ImageState::Available
                )
            }
        })
        .await;

        p.shutdown().await;
    }

    #[tokio::test]
    async fn start_twice_is_noop() {
        let p = provider();
        p.start();
        p.start();
        p.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_without_start() {
        let p = provider();
        p.shutdown().await;
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = ProviderConfig {
            pool: String::new(),
            ..ProviderConfig::default()
        };
        assert!(Provider::new(config).is_err());
    }
}
