//! # VM Snapshotter
//!
//! Coordinates one state-sync snapshot at a time between the host snapshot
//! manager and the VM controller.
//!
//! ## Export flow
//!
//! ```text
//! commit(height)
//!   └─► initiate_snapshot(height)            slot := Active(height)
//!         └─► task: send initiate ──► Started ──► host.snapshot(height)
//!                                                   └─► snapshot_extension(height)
//!                                                         send retrieve
//!                                                         read manifest + artifacts
//!                                                         write payloads
//!               Retrieved? ─yes─► Idle
//!                          └no──► send discard ──► Idle
//! wait_until_snapshot_started()  before the next commit
//! ```

use super::action_channel::ActionChannel;
use super::active::ActiveSnapshot;
use super::restore::RestoreContext;
use super::staging::StagingDir;
use crate::codec::{decode_manifest, encode_payload};
use crate::config::VmSnapshotConfig;
use crate::domain::{
    invariant_contained_artifact_path, invariant_manifest_height, invariant_matching_height,
    invariant_supported_format,
    ArtifactPayload, SnapshotAction, SnapshotError, SnapshotPhase, SnapshotRequest,
    EXPORT_MANIFEST_FILENAME, MODULE_NAME, SNAPSHOT_FORMAT,
};
use crate::ports::inbound::{
    ExtensionPayloadReader, ExtensionPayloadWriter, ExtensionSnapshotter, VmSnapshotApi,
};
use crate::ports::outbound::{ControllerTransport, SnapshotHost, StoreExporter};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// VM snapshot coordinator.
///
/// Cheap to clone; clones share the same snapshot slot. Register a clone
/// with the host snapshot manager as its `vm` extension.
#[derive(Clone)]
pub struct VmSnapshotter {
    inner: Arc<Inner>,
}

struct Inner {
    config: VmSnapshotConfig,
    host: Arc<dyn SnapshotHost>,
    exporter: Arc<dyn StoreExporter>,
    channel: ActionChannel,
    /// At most one snapshot in flight.
    active: Mutex<Option<Arc<ActiveSnapshot>>>,
    /// Background task of the latest attempt.
    task: Mutex<Option<JoinHandle<()>>>,
}

impl VmSnapshotter {
    /// Create a snapshotter for `host`.
    pub fn new(
        config: VmSnapshotConfig,
        host: Arc<dyn SnapshotHost>,
        exporter: Arc<dyn StoreExporter>,
        transport: Arc<dyn ControllerTransport>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                host,
                exporter,
                channel: ActionChannel::new(transport),
                active: Mutex::new(None),
                task: Mutex::new(None),
            }),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &VmSnapshotConfig {
        &self.inner.config
    }

    fn current(&self) -> Option<Arc<ActiveSnapshot>> {
        self.inner.active.lock().clone()
    }

    fn initiate(&self, height: u64) -> Result<(), SnapshotError> {
        let runtime = Handle::try_current().map_err(|e| SnapshotError::Runtime(e.to_string()))?;

        let mut slot = self.inner.active.lock();
        if let Some(active) = slot.as_ref() {
            return Err(SnapshotError::AlreadyInProgress {
                height: active.height(),
            });
        }
        if !self.inner.host.snapshot_manager_configured() {
            return Err(SnapshotError::ManagerNotConfigured);
        }

        let active = Arc::new(ActiveSnapshot::new(height));
        *slot = Some(Arc::clone(&active));

        let span = active.span().clone();
        span.in_scope(|| info!("[qc-18] Initiating VM snapshot at height {}", height));

        let inner = Arc::clone(&self.inner);
        let handle = runtime.spawn(async move { inner.run_snapshot(active).await }.instrument(span));
        *self.inner.task.lock() = Some(handle);
        Ok(())
    }

    async fn retrieve(
        &self,
        active: &ActiveSnapshot,
        height: u64,
        writer: &mut dyn ExtensionPayloadWriter,
    ) -> Result<(), SnapshotError> {
        invariant_matching_height(height, active.height())?;
        active.transition_to(SnapshotPhase::Retrieving)?;

        match self.stream_export(height, writer).await {
            Ok(()) => active.transition_to(SnapshotPhase::Retrieved),
            Err(e) => {
                if let Err(t) = active.transition_to(SnapshotPhase::Started) {
                    warn!("[qc-18] {}", t);
                }
                Err(e)
            }
        }
    }

    /// Fetch the staged export and forward every artifact to `writer`.
    async fn stream_export(
        &self,
        height: u64,
        writer: &mut dyn ExtensionPayloadWriter,
    ) -> Result<(), SnapshotError> {
        let action = SnapshotAction::new(height, SnapshotRequest::Retrieve);
        let reply = self.inner.channel.send(&action).await?;
        let export_dir: String = serde_json::from_str(&reply)?;
        let staging = StagingDir::adopt(PathBuf::from(export_dir));
        debug!("[qc-18] Controller staged export in {}", staging.path().display());

        let result = forward_artifacts(staging.path(), height, writer).await;
        staging.remove().await;
        result
    }
}

async fn forward_artifacts(
    dir: &Path,
    height: u64,
    writer: &mut dyn ExtensionPayloadWriter,
) -> Result<(), SnapshotError> {
    let manifest_bytes = tokio::fs::read(dir.join(EXPORT_MANIFEST_FILENAME)).await?;
    let manifest = decode_manifest(&manifest_bytes)?;
    invariant_manifest_height(manifest.block_height, height)?;
    if let Some(data) = &manifest.data {
        debug!("[qc-18] Ignoring exported data file {}", data);
    }

    for (name, file) in &manifest.artifacts {
        invariant_contained_artifact_path(file)?;
        let data = tokio::fs::read(dir.join(file)).await?;
        debug!("[qc-18] Writing artifact {} ({} bytes)", name, data.len());
        let payload = encode_payload(&ArtifactPayload {
            name: name.clone(),
            data,
        })?;
        writer.write(payload).await?;
    }

    info!(
        "[qc-18] Fully retrieved VM snapshot ({} artifacts) from {}",
        manifest.artifact_count(),
        dir.display()
    );
    Ok(())
}

/// Frees the snapshot slot when the task exits, including by unwinding or
/// cancellation. A start signal still pending at that point is failed so
/// waiters on the commit path never hang.
struct SlotRelease<'a> {
    slot: &'a Mutex<Option<Arc<ActiveSnapshot>>>,
    active: Arc<ActiveSnapshot>,
}

impl SlotRelease<'_> {
    /// Empty the slot if it still holds this attempt.
    fn release(&self) {
        let mut slot = self.slot.lock();
        if slot
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &self.active))
        {
            *slot = None;
        }
    }
}

impl Drop for SlotRelease<'_> {
    fn drop(&mut self) {
        self.release();
        if !self.active.started().is_resolved() {
            error!(
                "[qc-18] Snapshot task for height {} ended before the controller answered",
                self.active.height()
            );
            self.active.started().resolve(Err(SnapshotError::TaskAborted));
        }
    }
}

impl Inner {
    async fn run_snapshot(&self, active: Arc<ActiveSnapshot>) {
        let release = SlotRelease {
            slot: &self.active,
            active: Arc::clone(&active),
        };
        let height = active.height();

        let initiated = self
            .channel
            .send(&SnapshotAction::new(height, SnapshotRequest::Initiate))
            .await;
        if let Err(e) = initiated {
            error!("[qc-18] Failed to initiate VM snapshot: {}", e);
            self.advance(&active, SnapshotPhase::Idle);
            release.release();
            active.started().resolve(Err(e));
            return;
        }

        self.advance(&active, SnapshotPhase::Started);
        active.started().resolve(Ok(()));
        info!("[qc-18] VM snapshot started");

        if let Err(e) = self.host.snapshot(height).await {
            error!("[qc-18] Host snapshot failed: {}", e);
        }

        if active.phase() == SnapshotPhase::Retrieved {
            self.advance(&active, SnapshotPhase::Idle);
            release.release();
            info!("[qc-18] VM snapshot complete");
            return;
        }

        warn!("[qc-18] Failed to make VM snapshot, discarding");
        self.advance(&active, SnapshotPhase::Discarding);
        if let Err(e) = self
            .channel
            .send(&SnapshotAction::new(height, SnapshotRequest::Discard))
            .await
        {
            error!("[qc-18] Failed to discard VM snapshot: {}", e);
        }
        self.advance(&active, SnapshotPhase::Idle);
        release.release();
    }

    fn advance(&self, active: &ActiveSnapshot, next: SnapshotPhase) {
        if let Err(e) = active.transition_to(next) {
            error!("[qc-18] {}", e);
        }
    }
}

#[async_trait]
impl VmSnapshotApi for VmSnapshotter {
    fn initiate_snapshot(&self, height: u64) -> Result<(), SnapshotError> {
        self.initiate(height)
    }

    async fn wait_until_snapshot_started(&self) -> Result<(), SnapshotError> {
        let Some(active) = self.current() else {
            return Ok(());
        };
        active.started().wait().await
    }

    async fn wait_until_snapshot_finished(&self) {
        let handle = self.inner.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("[qc-18] Snapshot task ended abnormally: {}", e);
            }
        }
    }

    fn phase(&self) -> SnapshotPhase {
        self.current().map(|a| a.phase()).unwrap_or_default()
    }

    fn active_height(&self) -> Option<u64> {
        self.current().map(|a| a.height())
    }
}

#[async_trait]
impl ExtensionSnapshotter for VmSnapshotter {
    fn snapshot_name(&self) -> &str {
        MODULE_NAME
    }

    fn snapshot_format(&self) -> u32 {
        SNAPSHOT_FORMAT
    }

    fn supported_formats(&self) -> Vec<u32> {
        vec![SNAPSHOT_FORMAT]
    }

    async fn snapshot_extension(
        &self,
        height: u64,
        writer: &mut dyn ExtensionPayloadWriter,
    ) -> Result<(), SnapshotError> {
        let Some(active) = self.current() else {
            error!(
                "[qc-18] Snapshot extension called for height {} with no active VM snapshot",
                height
            );
            return Err(SnapshotError::NoActiveSnapshot);
        };

        let span = active.span().clone();
        let result = self
            .retrieve(&active, height, writer)
            .instrument(span.clone())
            .await;
        if let Err(e) = &result {
            span.in_scope(|| error!("[qc-18] VM snapshot retrieval failed: {}", e));
        }
        result
    }

    async fn restore_extension(
        &self,
        height: u64,
        format: u32,
        reader: &mut dyn ExtensionPayloadReader,
    ) -> Result<(), SnapshotError> {
        invariant_supported_format(format)?;

        let span = info_span!("vm_restore", height);
        let ctx = RestoreContext {
            config: &self.inner.config,
            host: self.inner.host.as_ref(),
            exporter: self.inner.exporter.as_ref(),
            channel: &self.inner.channel,
        };
        match ctx.restore(height, reader).instrument(span.clone()).await {
            Ok(_) => Ok(()),
            Err(e) => {
                span.in_scope(|| error!("[qc-18] VM restore failed: {}", e));
                Err(e)
            }
        }
    }
}
