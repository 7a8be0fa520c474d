//! # Domain Errors
//!
//! Error types for VM snapshot coordination.
//!
//! Errors fall into four groups: precondition failures (rejected before any
//! side effect), controller transport failures, integrity failures of the
//! staged export, and filesystem I/O failures while staging.

use super::value_objects::SnapshotPhase;
use thiserror::Error;

/// VM snapshot error types.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A snapshot is already in flight.
    #[error("snapshot already in progress for height {height}")]
    AlreadyInProgress {
        /// Height of the snapshot currently in flight
        height: u64,
    },

    /// The host has no snapshot manager.
    #[error("snapshot manager not configured")]
    ManagerNotConfigured,

    /// No snapshot is in flight.
    #[error("no active VM snapshot")]
    NoActiveSnapshot,

    /// The host asked for a height other than the one initiated.
    #[error("VM snapshot requested for unexpected height {requested} (expected {expected})")]
    UnexpectedHeight {
        /// Height passed by the host
        requested: u64,
        /// Height of the active snapshot
        expected: u64,
    },

    /// The staged manifest describes a different height.
    #[error("snapshot manifest blockHeight ({manifest}) doesn't match ({expected})")]
    ManifestHeightMismatch {
        /// Height found in the manifest
        manifest: u64,
        /// Height being retrieved
        expected: u64,
    },

    /// A manifest filename points outside the export directory.
    #[error("artifact file {0:?} is not contained in the export directory")]
    UncontainedArtifactPath(String),

    /// Restore requested with a format this extension cannot read.
    #[error("unknown snapshot format {0}")]
    UnknownFormat(u32),

    /// The snapshot state machine rejected a transition.
    #[error("invalid snapshot phase transition: {from} -> {to}")]
    InvalidPhaseTransition {
        /// Current phase
        from: SnapshotPhase,
        /// Attempted phase
        to: SnapshotPhase,
    },

    /// The VM controller round trip failed.
    #[error("controller transport error: {0}")]
    Transport(String),

    /// The host snapshot manager or payload stream failed.
    #[error("host snapshot error: {0}")]
    Host(String),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An artifact payload could not be decoded.
    #[error("artifact payload decode error: {0}")]
    PayloadDecode(#[from] prost::DecodeError),

    /// An artifact payload could not be encoded.
    #[error("artifact payload encode error: {0}")]
    PayloadEncode(#[from] prost::EncodeError),

    /// Filesystem failure while staging.
    #[error("staging I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No async runtime available to run the snapshot task.
    #[error("runtime unavailable: {0}")]
    Runtime(String),

    /// The snapshot task ended without reporting whether it started.
    #[error("snapshot task aborted")]
    TaskAborted,

    /// The logging subscriber could not be installed.
    #[error("logging initialisation failed: {0}")]
    Telemetry(String),
}

impl SnapshotError {
    /// True for errors rejected before any side effect took place.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            SnapshotError::AlreadyInProgress { .. }
                | SnapshotError::ManagerNotConfigured
                | SnapshotError::UnknownFormat(_)
                | SnapshotError::Runtime(_)
        )
    }
}
