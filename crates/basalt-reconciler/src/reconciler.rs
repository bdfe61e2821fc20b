use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use basalt_backend::{VolumeBackend, VolumeOptions};
use basalt_queue::WorkQueue;
use basalt_registry::{ContentResolver, ImageRef};
use basalt_store::{EventKind, Store};
use basalt_types::size;
use basalt_types::{Image, ImageAccess, ImageState, Metadata, Object, Snapshot, SnapshotState, WwnGenerator};

use crate::config::ReconcilerConfig;
use crate::error::ReconcilerResult;

/// Finalizer marking images whose backend volume may exist and must be
/// removed before the entity can be purged.
pub const IMAGE_FINALIZER: &str = "image";

/// Prefix keeping caller limits clear of backend-reserved metadata keys.
pub const LIMIT_METADATA_PREFIX: &str = "conf_";

/// Label on snapshots carrying the content digest they were created for.
pub const IMAGE_DIGEST_LABEL: &str = "image-digest";

/// Snapshot tag under which a snapshot volume's fully populated content is
/// frozen; clones are taken from it.
pub const BASE_SNAPSHOT: &str = "base";

const CLIENT_PREFIX: &str = "client.";

/// Backend volume name for an image.
pub fn image_volume_name(id: &str) -> String {
    format!("img-{id}")
}

/// Backend volume name for a snapshot. Keyed by the digest's hex part; the
/// algorithm prefix is dropped to keep the name backend-safe.
pub fn snapshot_volume_name(id: &str) -> String {
    let hex = id.split_once(':').map(|(_, hex)| hex).unwrap_or(id);
    format!("snap-{hex}")
}

/// Converges Image entities on the volume backend.
///
/// Subscribe-enqueue-reconcile: change events feed image IDs into a
/// deduplicating [`WorkQueue`], a pool of workers pops them, and each pass
/// drives one image through the provisioning state machine. Per-key
/// serialization comes entirely from the queue; the reconciler itself keeps
/// no per-image state.
pub struct ImageReconciler {
    images: Arc<dyn Store<Image>>,
    snapshots: Arc<dyn Store<Snapshot>>,
    resolver: Arc<dyn ContentResolver>,
    backend: Arc<dyn VolumeBackend>,
    queue: WorkQueue<String>,
    wwn: WwnGenerator,
    config: ReconcilerConfig,
}

impl std::fmt::Debug for ImageReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageReconciler")
            .field("wwn", &self.wwn)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ImageReconciler {
    /// Build a reconciler over the given collaborators.
    ///
    /// Fails fast on incomplete configuration; per-item errors never
    /// surface here.
    pub fn new(
        images: Arc<dyn Store<Image>>,
        snapshots: Arc<dyn Store<Snapshot>>,
        resolver: Arc<dyn ContentResolver>,
        backend: Arc<dyn VolumeBackend>,
        config: ReconcilerConfig,
    ) -> ReconcilerResult<Self> {
        config.validate()?;
        Ok(Self {
            images,
            snapshots,
            resolver,
            backend,
            queue: WorkQueue::new(),
            wwn: WwnGenerator::new(),
            config,
        })
    }

    /// Run until `shutdown` flips to `true` (or its sender drops).
    ///
    /// Spawns the event forwarders and the worker pool, then waits for the
    /// workers: on shutdown the queue drains and every in-flight
    /// reconciliation finishes before this returns.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(workers = self.config.workers, "image reconciler started");

        let image_events = tokio::spawn(Arc::clone(&self).forward_image_events());
        let snapshot_events = tokio::spawn(Arc::clone(&self).forward_snapshot_events());

        let queue = self.queue.clone();
        let stopper = tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
            queue.shut_down();
        });

        let mut workers = Vec::with_capacity(self.config.workers);
        for _ in 0..self.config.workers {
            let this = Arc::clone(&self);
            workers.push(tokio::spawn(async move { this.worker_loop().await }));
        }
        for worker in workers {
            let _ = worker.await;
        }

        image_events.abort();
        snapshot_events.abort();
        stopper.abort();
        info!("image reconciler stopped");
    }

    /// Enqueue image IDs for created and deleted images. Updates are
    /// skipped: the reconciler writes image status itself and must not
    /// self-trigger.
    async fn forward_image_events(self: Arc<Self>) {
        let mut events = self.images.watch();
        loop {
            match events.recv().await {
                Ok(event) => {
                    if event.kind == EventKind::Updated {
                        continue;
                    }
                    self.queue.add(event.object.id().to_string());
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "image event stream lagged, resynchronizing");
                    self.enqueue_all_images().await;
                }
                Err(RecvError::Closed) => return,
            }
        }
    }

    /// Enqueue every image waiting on a snapshot that just became
    /// populated.
    async fn forward_snapshot_events(self: Arc<Self>) {
        let mut events = self.snapshots.watch();
        loop {
            match events.recv().await {
                Ok(event) => {
                    if event.kind != EventKind::Updated
                        || event.object.status.state != SnapshotState::Populated
                    {
                        continue;
                    }
                    self.enqueue_snapshot_dependents(event.object.id()).await;
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "snapshot event stream lagged, resynchronizing");
                    self.enqueue_all_images().await;
                }
                Err(RecvError::Closed) => return,
            }
        }
    }

    async fn enqueue_all_images(&self) {
        match self.images.list().await {
            Ok(images) => {
                for image in images {
                    self.queue.add(image.id().to_string());
                }
            }
            Err(err) => error!(error = %err, "failed to list images"),
        }
    }

    async fn enqueue_snapshot_dependents(&self, snapshot_id: &str) {
        let images = match self.images.list().await {
            Ok(images) => images,
            Err(err) => {
                error!(error = %err, "failed to list images");
                return;
            }
        };
        for image in images {
            if image.spec.snapshot_ref.as_deref() == Some(snapshot_id) {
                self.queue.add(image.id().to_string());
            }
        }
    }

    /// Pop and reconcile until the queue shuts down. Errors requeue the
    /// image with backoff; no error is fatal to the loop.
    async fn worker_loop(&self) {
        while let Some(id) = self.queue.get().await {
            match self.reconcile_image(&id).await {
                Ok(()) => self.queue.forget(&id),
                Err(err) => {
                    warn!(image = %id, error = %err, "failed to reconcile image");
                    self.queue.add_rate_limited(id.clone());
                }
            }
            self.queue.done(&id);
        }
    }

    /// One pass of the provisioning state machine for `id`.
    async fn reconcile_image(&self, id: &str) -> ReconcilerResult<()> {
        let mut image = match self.images.get(id).await {
            Ok(image) => image,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        if image.metadata.is_deleting() {
            self.delete_image(&mut image).await?;
            debug!(image = %id, "deleted image");
            return Ok(());
        }

        if image.status.state == ImageState::Available {
            debug!(image = %id, "image already provisioned");
            return Ok(());
        }

        // Cleanup intent must be durable before the backend can hold state
        // for this image.
        if image.metadata.add_finalizer(IMAGE_FINALIZER) {
            image = self.images.update(image).await?;
        }

        self.reconcile_snapshot(&mut image).await?;

        let options = VolumeOptions {
            data_pool: Some(self.config.pool.clone()),
        };

        if let Some(snapshot_ref) = image.spec.snapshot_ref.clone() {
            if !self
                .clone_from_snapshot(&image, &snapshot_ref, &options)
                .await?
            {
                // Not ready: the snapshot's Populated event re-enqueues us.
                return Ok(());
            }
        } else {
            self.create_blank_volume(&image, &options).await?;
        }

        if !image.spec.limits.is_empty() {
            self.apply_limits(&image).await?;
        }

        let credentials = self.backend.fetch_credentials(&self.config.client).await?;
        let user = credentials
            .user
            .strip_prefix(CLIENT_PREFIX)
            .unwrap_or(&credentials.user)
            .to_string();

        image.status.access = Some(ImageAccess {
            monitors: self.config.monitors.clone(),
            handle: format!("{}/{}", self.config.pool, image.id()),
            user,
            user_key: credentials.key,
            wwn: self.wwn.generate(),
        });
        image.status.state = ImageState::Available;
        self.images.update(image).await?;

        info!(image = %id, "image provisioned");
        Ok(())
    }

    /// Resolve the source reference and record the content-addressed
    /// snapshot the image clones from. No-op unless the spec names a source
    /// and no snapshot is recorded yet.
    async fn reconcile_snapshot(&self, image: &mut Image) -> ReconcilerResult<()> {
        if image.spec.image.is_empty() || image.spec.snapshot_ref.is_some() {
            return Ok(());
        }

        let image_ref = ImageRef::parse(&image.spec.image)?;
        let resolved = self.resolver.resolve(&image_ref).await?;
        let digest = resolved.digest;

        let snapshot = match self.snapshots.get(digest.as_str()).await {
            Ok(snapshot) => snapshot,
            Err(err) if err.is_not_found() => {
                let mut snapshot = Snapshot::default();
                snapshot.metadata = Metadata::with_id(digest.as_str());
                snapshot
                    .metadata
                    .labels
                    .insert(IMAGE_DIGEST_LABEL.to_string(), digest.to_string());
                snapshot.source.image = image_ref.canonical(&digest);
                match self.snapshots.create(snapshot).await {
                    Ok(snapshot) => {
                        debug!(snapshot = %digest, "created snapshot");
                        snapshot
                    }
                    // A concurrent reconciliation won the create; converge
                    // on its entity.
                    Err(err) if err.is_already_exists() => {
                        self.snapshots.get(digest.as_str()).await?
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            Err(err) => return Err(err.into()),
        };

        image.spec.snapshot_ref = Some(snapshot.id().to_string());
        *image = self.images.update(image.clone()).await?;

        // The Populated event may fire before the ref write above is
        // visible to the snapshot handler; one immediate requeue closes
        // that window.
        self.queue.add(image.id().to_string());

        Ok(())
    }

    /// Clone the image's volume from its populated snapshot and grow it to
    /// spec. Returns `Ok(false)` while the snapshot is missing or not yet
    /// populated; that is a wait, not a failure.
    async fn clone_from_snapshot(
        &self,
        image: &Image,
        snapshot_ref: &str,
        options: &VolumeOptions,
    ) -> ReconcilerResult<bool> {
        let snapshot = match self.snapshots.get(snapshot_ref).await {
            Ok(snapshot) => snapshot,
            Err(err) if err.is_not_found() => {
                debug!(image = %image.id(), snapshot = snapshot_ref, "snapshot not found");
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        };

        if snapshot.status.state != SnapshotState::Populated {
            debug!(image = %image.id(), snapshot = %snapshot.id(), "snapshot not populated");
            return Ok(false);
        }

        let volume = image_volume_name(image.id());
        match self
            .backend
            .clone_volume(
                &snapshot_volume_name(snapshot.id()),
                BASE_SNAPSHOT,
                &volume,
                options,
            )
            .await
        {
            Ok(()) => {}
            // A prior pass already cloned; converge on the existing volume.
            Err(err) if err.is_already_exists() => {}
            Err(err) => return Err(err.into()),
        }

        // Clones inherit the snapshot's size and are grown, never shrunk,
        // to the spec.
        let target = size::round_up(image.spec.size);
        let current = self.backend.volume_size(&volume).await?;
        if target > current {
            self.backend.resize_volume(&volume, target).await?;
        }

        debug!(image = %image.id(), snapshot = %snapshot.id(), "cloned volume");
        Ok(true)
    }

    async fn create_blank_volume(
        &self,
        image: &Image,
        options: &VolumeOptions,
    ) -> ReconcilerResult<()> {
        let volume = image_volume_name(image.id());
        match self
            .backend
            .create_volume(&volume, size::round_up(image.spec.size), options)
            .await
        {
            Ok(()) => {
                debug!(image = %image.id(), size = image.spec.size, "created volume");
                Ok(())
            }
            // A prior pass already created it; converge on the existing
            // volume.
            Err(err) if err.is_already_exists() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn apply_limits(&self, image: &Image) -> ReconcilerResult<()> {
        let volume = image_volume_name(image.id());
        for (limit, value) in &image.spec.limits {
            self.backend
                .set_volume_meta(
                    &volume,
                    &format!("{LIMIT_METADATA_PREFIX}{limit}"),
                    &value.to_string(),
                )
                .await?;
            trace!(image = %image.id(), limit = %limit, value, "set volume limit");
        }
        Ok(())
    }

    /// Deletion path: remove the backend volume, then the finalizer.
    /// Idempotent at every step.
    async fn delete_image(&self, image: &mut Image) -> ReconcilerResult<()> {
        if !image.metadata.has_finalizer(IMAGE_FINALIZER) {
            debug!(image = %image.id(), "image has no finalizer: done");
            return Ok(());
        }

        match self
            .backend
            .remove_volume(&image_volume_name(image.id()))
            .await
        {
            Ok(()) => {}
            // Already gone, possibly from a prior partial deletion.
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }

        image.metadata.remove_finalizer(IMAGE_FINALIZER);
        match self.images.update(image.clone()).await {
            Ok(_) => {}
            // Concurrently purged once unreferenced.
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }
}
