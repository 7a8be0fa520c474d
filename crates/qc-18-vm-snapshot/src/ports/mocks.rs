//! Mock port implementations for testing.

use super::inbound::ExtensionSnapshotter;
use super::outbound::{ControllerTransport, SnapshotHost, StoreExporter};
use crate::adapters::BufferedPayloadWriter;
use crate::codec::{decode_data_entries, decode_manifest};
use crate::domain::{
    DataEntry, ExportManifest, SnapshotAction, SnapshotError, SnapshotRequest, StateView,
    EXPORT_MANIFEST_FILENAME,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

async fn pass_gate(gate: &Semaphore) -> Result<(), SnapshotError> {
    gate.acquire()
        .await
        .map_err(|e| SnapshotError::Transport(e.to_string()))?
        .forget();
    Ok(())
}

// =============================================================================
// Controller
// =============================================================================

/// Staging directory contents seen by the mock controller on restore.
///
/// Captured during the round trip, because the directory is gone once the
/// restore returns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagedImport {
    /// Directory passed in the restore action.
    pub staging_dir: PathBuf,
    /// Decoded manifest.
    pub manifest: ExportManifest,
    /// Decoded trusted data file.
    pub data: Vec<DataEntry>,
    /// Artifact names and file contents, in manifest order.
    pub artifacts: Vec<(String, Vec<u8>)>,
}

/// Mock VM controller.
///
/// Records every action, serves a pre-staged export directory on
/// `retrieve`, and captures the staged directory on `restore`.
pub struct MockController {
    actions: Mutex<Vec<SnapshotAction>>,
    failing: Mutex<HashSet<SnapshotRequest>>,
    export_dir: Mutex<Option<PathBuf>>,
    retrieve_reply: Mutex<Option<String>>,
    hold_initiate: AtomicBool,
    initiate_gate: Semaphore,
    imports: Mutex<Vec<StagedImport>>,
}

impl Default for MockController {
    fn default() -> Self {
        Self {
            actions: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            export_dir: Mutex::new(None),
            retrieve_reply: Mutex::new(None),
            hold_initiate: AtomicBool::new(false),
            initiate_gate: Semaphore::new(0),
            imports: Mutex::new(Vec::new()),
        }
    }
}

impl MockController {
    /// Controller that accepts every request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every future `request` with a transport error.
    pub fn fail_on(&self, request: SnapshotRequest) {
        self.failing.lock().insert(request);
    }

    /// Directory returned by `retrieve`.
    pub fn set_export_dir(&self, dir: impl Into<PathBuf>) {
        *self.export_dir.lock() = Some(dir.into());
    }

    /// Raw reply returned by `retrieve`, overriding the export directory.
    pub fn set_retrieve_reply(&self, reply: impl Into<String>) {
        *self.retrieve_reply.lock() = Some(reply.into());
    }

    /// Block `initiate` requests until [`MockController::release_initiate`].
    pub fn hold_initiate(&self) {
        self.hold_initiate.store(true, Ordering::SeqCst);
    }

    /// Let one held `initiate` request through.
    pub fn release_initiate(&self) {
        self.initiate_gate.add_permits(1);
    }

    /// Every action received so far.
    pub fn actions(&self) -> Vec<SnapshotAction> {
        self.actions.lock().clone()
    }

    /// Request kinds received so far, in order.
    pub fn requests(&self) -> Vec<SnapshotRequest> {
        self.actions.lock().iter().map(|a| a.request).collect()
    }

    /// Imports captured on `restore`.
    pub fn imports(&self) -> Vec<StagedImport> {
        self.imports.lock().clone()
    }

    fn capture_import(action: &SnapshotAction) -> Result<StagedImport, SnapshotError> {
        let dir: String = match action.args.first() {
            Some(arg) => serde_json::from_value(arg.clone())?,
            None => {
                return Err(SnapshotError::Transport(
                    "restore without staging directory".to_string(),
                ))
            }
        };
        let staging_dir = PathBuf::from(dir);
        let manifest = decode_manifest(&std::fs::read(staging_dir.join(EXPORT_MANIFEST_FILENAME))?)?;
        let data = match &manifest.data {
            Some(name) => decode_data_entries(&std::fs::read_to_string(staging_dir.join(name))?)?,
            None => Vec::new(),
        };
        let artifacts = manifest
            .artifacts
            .iter()
            .map(|(name, file)| -> Result<(String, Vec<u8>), SnapshotError> {
                Ok((name.clone(), read_staged(&staging_dir, file)?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StagedImport {
            staging_dir,
            manifest,
            data,
            artifacts,
        })
    }
}

fn read_staged(dir: &Path, file: &str) -> Result<Vec<u8>, SnapshotError> {
    Ok(std::fs::read(dir.join(file))?)
}

#[async_trait]
impl ControllerTransport for MockController {
    async fn send(&self, _need_reply: bool, message: String) -> Result<String, SnapshotError> {
        let action: SnapshotAction = serde_json::from_str(&message)?;
        let request = action.request;
        self.actions.lock().push(action.clone());

        if request == SnapshotRequest::Initiate && self.hold_initiate.load(Ordering::SeqCst) {
            pass_gate(&self.initiate_gate).await?;
        }

        if self.failing.lock().contains(&request) {
            return Err(SnapshotError::Transport(format!(
                "controller rejected {} at height {}",
                request, action.block_height
            )));
        }

        match request {
            SnapshotRequest::Retrieve => {
                let raw_reply = self.retrieve_reply.lock().clone();
                if let Some(reply) = raw_reply {
                    return Ok(reply);
                }
                let dir = self.export_dir.lock().clone().ok_or_else(|| {
                    SnapshotError::Transport("no export staged".to_string())
                })?;
                Ok(serde_json::to_string(&dir.to_string_lossy())?)
            }
            SnapshotRequest::Restore => {
                let import = Self::capture_import(&action)?;
                self.imports.lock().push(import);
                Ok("true".to_string())
            }
            SnapshotRequest::Initiate | SnapshotRequest::Discard => Ok("true".to_string()),
        }
    }
}

// =============================================================================
// Host
// =============================================================================

/// Mock host application with a snapshot manager that calls back into a
/// registered extension.
pub struct MockSnapshotHost {
    configured: bool,
    invoke_extension: AtomicBool,
    hold_snapshot: AtomicBool,
    snapshot_gate: Semaphore,
    extension: Mutex<Option<Arc<dyn ExtensionSnapshotter>>>,
    snapshot_calls: Mutex<Vec<u64>>,
    payloads: Mutex<Vec<Vec<u8>>>,
    views: Mutex<Vec<StateView>>,
}

impl Default for MockSnapshotHost {
    fn default() -> Self {
        Self {
            configured: true,
            invoke_extension: AtomicBool::new(true),
            hold_snapshot: AtomicBool::new(false),
            snapshot_gate: Semaphore::new(0),
            extension: Mutex::new(None),
            snapshot_calls: Mutex::new(Vec::new()),
            payloads: Mutex::new(Vec::new()),
            views: Mutex::new(Vec::new()),
        }
    }
}

impl MockSnapshotHost {
    /// Host with a snapshot manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Host without a snapshot manager.
    pub fn without_manager() -> Self {
        Self {
            configured: false,
            ..Self::default()
        }
    }

    /// Extension the snapshot manager calls back into.
    pub fn register_extension(&self, extension: Arc<dyn ExtensionSnapshotter>) {
        *self.extension.lock() = Some(extension);
    }

    /// Make the snapshot manager fail before reaching the extension.
    pub fn skip_extension(&self) {
        self.invoke_extension.store(false, Ordering::SeqCst);
    }

    /// Block host snapshots until [`MockSnapshotHost::release_snapshot`].
    pub fn hold_snapshots(&self) {
        self.hold_snapshot.store(true, Ordering::SeqCst);
    }

    /// Let one held host snapshot proceed.
    pub fn release_snapshot(&self) {
        self.snapshot_gate.add_permits(1);
    }

    /// Heights the host was asked to snapshot.
    pub fn snapshot_calls(&self) -> Vec<u64> {
        self.snapshot_calls.lock().clone()
    }

    /// Payloads collected from successful extension calls.
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.payloads.lock().clone()
    }

    /// Views handed out through [`SnapshotHost::read_only_view`].
    pub fn views(&self) -> Vec<StateView> {
        self.views.lock().clone()
    }
}

#[async_trait]
impl SnapshotHost for MockSnapshotHost {
    fn snapshot_manager_configured(&self) -> bool {
        self.configured
    }

    async fn snapshot(&self, height: u64) -> Result<(), SnapshotError> {
        self.snapshot_calls.lock().push(height);

        if self.hold_snapshot.load(Ordering::SeqCst) {
            pass_gate(&self.snapshot_gate).await?;
        }

        if !self.invoke_extension.load(Ordering::SeqCst) {
            return Err(SnapshotError::Host(
                "snapshot manager failed before extensions".to_string(),
            ));
        }

        let extension = self.extension.lock().clone();
        let Some(extension) = extension else {
            return Err(SnapshotError::Host("no extension registered".to_string()));
        };

        let mut writer = BufferedPayloadWriter::default();
        extension.snapshot_extension(height, &mut writer).await?;
        self.payloads.lock().extend(writer.into_payloads());
        Ok(())
    }

    fn read_only_view(&self, height: u64) -> StateView {
        let view = StateView::uncached(height);
        self.views.lock().push(view);
        view
    }
}

// =============================================================================
// Store exporter
// =============================================================================

/// Mock exporter returning a fixed set of entries.
#[derive(Default)]
pub struct MockStoreExporter {
    entries: Vec<DataEntry>,
    should_fail: bool,
    views: Mutex<Vec<StateView>>,
}

impl MockStoreExporter {
    /// Exporter yielding `entries`.
    pub fn new(entries: Vec<DataEntry>) -> Self {
        Self {
            entries,
            ..Default::default()
        }
    }

    /// Exporter that always fails.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    /// Entries this exporter yields.
    pub fn entries(&self) -> &[DataEntry] {
        &self.entries
    }

    /// Views the exporter was called with.
    pub fn views(&self) -> Vec<StateView> {
        self.views.lock().clone()
    }
}

impl StoreExporter for MockStoreExporter {
    fn export_vm_store(&self, view: &StateView) -> Result<Vec<DataEntry>, SnapshotError> {
        self.views.lock().push(*view);
        if self.should_fail {
            return Err(SnapshotError::Host("store export failed".to_string()));
        }
        Ok(self.entries.clone())
    }
}
