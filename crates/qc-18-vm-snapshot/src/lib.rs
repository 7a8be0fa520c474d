//! # QC-18 VM Snapshot
//!
//! State-sync snapshot export/import coordination between the host chain
//! and the external VM controller.
//!
//! **Subsystem ID:** 18  
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)  
//! **Status:** Production-Ready
//!
//! ## Purpose
//!
//! The VM keeps its state outside the host store. When the host takes a
//! state-sync snapshot, the VM controller must export its own state for
//! the same height, and on restore it must import what the host streamed
//! back. This crate is the host-side half of that handoff:
//! - at most one snapshot in flight, started right after commit
//! - the commit path blocks only until the controller has started
//! - artifacts travel through the host snapshot stream as a `vm` extension
//! - staging directories never outlive the operation that created them
//!
//! ## Module Structure
//!
//! ```text
//! qc-18-vm-snapshot/
//! ├── domain/          # Actions, manifest, phases, errors, invariants
//! ├── codec/           # Manifest, data file and payload encodings
//! ├── ports/           # API traits (inbound) + dependency traits (outbound)
//! ├── application/     # VmSnapshotter and the restore path
//! ├── adapters/        # Blocking controller transport, buffered streams
//! ├── config.rs        # VmSnapshotConfig
//! └── telemetry.rs     # Logging setup
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod application;
pub mod codec;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;

// Re-exports
pub use adapters::{BufferedPayloadReader, BufferedPayloadWriter, FnControllerTransport};
pub use application::VmSnapshotter;
pub use config::VmSnapshotConfig;
pub use domain::{
    ArtifactPayload, DataEntry, ExportManifest, SnapshotAction, SnapshotError, SnapshotPhase,
    SnapshotRequest, StateView, EXPORTED_FILES_MODE, EXPORT_DATA_FILENAME,
    EXPORT_MANIFEST_FILENAME, MODULE_NAME, SNAPSHOT_ACTION_TYPE, SNAPSHOT_FORMAT,
};
pub use ports::{
    ControllerTransport, ExtensionPayloadReader, ExtensionPayloadWriter, ExtensionSnapshotter,
    MockController, MockSnapshotHost, MockStoreExporter, SnapshotHost, StagedImport,
    StoreExporter, VmSnapshotApi,
};
pub use telemetry::{init_logging, init_test_logging};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
