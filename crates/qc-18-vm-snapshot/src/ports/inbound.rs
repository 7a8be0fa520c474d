//! # Inbound Ports
//!
//! What the host can ask of this subsystem: the commit-path API and the
//! snapshot extension callbacks invoked by the host snapshot manager.

use crate::domain::{SnapshotError, SnapshotPhase};
use async_trait::async_trait;

/// Sink for extension payloads while the host builds a snapshot.
#[async_trait]
pub trait ExtensionPayloadWriter: Send {
    /// Append one encoded payload to the host snapshot stream.
    async fn write(&mut self, payload: Vec<u8>) -> Result<(), SnapshotError>;
}

/// Source of extension payloads while the host restores a snapshot.
#[async_trait]
pub trait ExtensionPayloadReader: Send {
    /// Next encoded payload, or `None` at the extension boundary.
    async fn read(&mut self) -> Result<Option<Vec<u8>>, SnapshotError>;
}

/// Extension snapshotter contract of the host snapshot manager.
#[async_trait]
pub trait ExtensionSnapshotter: Send + Sync {
    /// Unique name of the extension within the snapshot manager.
    fn snapshot_name(&self) -> &str;

    /// Format used to encode payloads when taking a snapshot.
    fn snapshot_format(&self) -> u32;

    /// Formats this extension can restore from.
    fn supported_formats(&self) -> Vec<u32>;

    /// Stream the extension's artifacts for `height` into `writer`.
    ///
    /// Called by the host snapshot manager from inside the snapshot task
    /// started by [`VmSnapshotApi::initiate_snapshot`].
    async fn snapshot_extension(
        &self,
        height: u64,
        writer: &mut dyn ExtensionPayloadWriter,
    ) -> Result<(), SnapshotError>;

    /// Restore the extension state for `height` from `reader`.
    async fn restore_extension(
        &self,
        height: u64,
        format: u32,
        reader: &mut dyn ExtensionPayloadReader,
    ) -> Result<(), SnapshotError>;
}

/// Commit-path API.
#[async_trait]
pub trait VmSnapshotApi: Send + Sync {
    /// Start a snapshot of the state committed at `height`.
    ///
    /// Returns once the attempt is registered; the controller round trips
    /// run on a background task.
    fn initiate_snapshot(&self, height: u64) -> Result<(), SnapshotError>;

    /// Wait until the controller has started the snapshot in flight, if any.
    ///
    /// Must be awaited before the host commits the next block. Only the
    /// first call after a failed initiate reports the error.
    async fn wait_until_snapshot_started(&self) -> Result<(), SnapshotError>;

    /// Wait for the background task of the latest attempt to exit.
    async fn wait_until_snapshot_finished(&self);

    /// Phase of the snapshot in flight ([`SnapshotPhase::Idle`] if none).
    fn phase(&self) -> SnapshotPhase;

    /// Height of the snapshot in flight.
    fn active_height(&self) -> Option<u64>;
}
