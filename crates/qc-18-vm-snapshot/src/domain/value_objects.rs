//! # Domain Value Objects
//!
//! Immutable value types for VM snapshot coordination.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Request kinds understood by the VM controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotRequest {
    /// Begin exporting the state committed at the given height.
    Initiate,
    /// Abandon an initiated export.
    Discard,
    /// Hand over the staged export directory.
    Retrieve,
    /// Import a staged directory.
    Restore,
}

impl SnapshotRequest {
    /// Wire name of the request.
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotRequest::Initiate => "initiate",
            SnapshotRequest::Discard => "discard",
            SnapshotRequest::Retrieve => "retrieve",
            SnapshotRequest::Restore => "restore",
        }
    }
}

impl fmt::Display for SnapshotRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a snapshot attempt.
///
/// ```text
/// Idle ─► Initiating ─┬─► Started ─┬─► Retrieving ─┬─► Retrieved ─► Idle
///                     │            │       ▲       │
///                     │            │       └───────┘ (retrieval failed)
///                     │            └─► Discarding ─► Idle
///                     └─► Idle (initiate failed)
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotPhase {
    /// No snapshot in flight.
    #[default]
    Idle,
    /// Initiate round trip in flight.
    Initiating,
    /// Controller accepted the snapshot; waiting for the host to retrieve it.
    Started,
    /// Extension callback is streaming artifacts.
    Retrieving,
    /// All artifacts were handed to the host.
    Retrieved,
    /// Retrieval did not happen or failed; discard in flight.
    Discarding,
}

impl SnapshotPhase {
    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: SnapshotPhase) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Initiating)
                | (Self::Initiating, Self::Started)
                | (Self::Initiating, Self::Idle)
                | (Self::Started, Self::Retrieving)
                | (Self::Started, Self::Discarding)
                | (Self::Retrieving, Self::Retrieved)
                | (Self::Retrieving, Self::Started)
                | (Self::Retrieved, Self::Idle)
                | (Self::Discarding, Self::Idle)
        )
    }
}

impl fmt::Display for SnapshotPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SnapshotPhase::Idle => "idle",
            SnapshotPhase::Initiating => "initiating",
            SnapshotPhase::Started => "started",
            SnapshotPhase::Retrieving => "retrieving",
            SnapshotPhase::Retrieved => "retrieved",
            SnapshotPhase::Discarding => "discarding",
        };
        f.write_str(name)
    }
}

/// Trusted key/value entry exported from the host store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntry {
    /// Store path.
    pub path: String,
    /// Stored value.
    pub value: String,
}

impl DataEntry {
    /// Create a new entry.
    pub fn new(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }
}

/// Read-only view of host state pinned at a height.
///
/// Restores always build a fresh, uncached view so the exporter reads the
/// state that was verified against the app hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateView {
    /// Height the view is pinned to.
    pub height: u64,
    /// Whether reads go through the host's write cache.
    pub cached: bool,
}

impl StateView {
    /// Fresh uncached view at `height`.
    pub fn uncached(height: u64) -> Self {
        Self {
            height,
            cached: false,
        }
    }
}
