//! # Outbound Ports
//!
//! Traits for external dependencies: the VM controller transport, the host
//! application and its store exporter.

use crate::domain::{DataEntry, SnapshotError, StateView};
use async_trait::async_trait;

/// Raw round trip into the VM controller.
///
/// Snapshot actions are out-of-band reads of the controller's last committed
/// state, so implementations must tolerate being called from the snapshot
/// task while the host keeps processing blocks.
#[async_trait]
pub trait ControllerTransport: Send + Sync {
    /// Send a JSON message and return the controller's reply verbatim.
    async fn send(&self, need_reply: bool, message: String) -> Result<String, SnapshotError>;
}

/// Host application hooks.
#[async_trait]
pub trait SnapshotHost: Send + Sync {
    /// Whether the host has a snapshot manager.
    fn snapshot_manager_configured(&self) -> bool;

    /// Take a host snapshot at `height`.
    ///
    /// The host snapshot manager is expected to call
    /// `ExtensionSnapshotter::snapshot_extension` before this returns.
    async fn snapshot(&self, height: u64) -> Result<(), SnapshotError>;

    /// Fresh read-only view of the host state at `height`.
    fn read_only_view(&self, height: u64) -> StateView;
}

/// Exports the trusted VM store entries held by the host.
pub trait StoreExporter: Send + Sync {
    /// Entries seeding a VM import, read through `view`.
    fn export_vm_store(&self, view: &StateView) -> Result<Vec<DataEntry>, SnapshotError>;
}
