//! # Domain Invariants
//!
//! Rules every snapshot attempt and every staged export must satisfy.

use super::errors::SnapshotError;
use std::path::{Component, Path};

/// Module identifier reported to the host snapshot manager.
pub const MODULE_NAME: &str = "vm";

/// Payload format: one protobuf message per artifact (name + bytes).
pub const SNAPSHOT_FORMAT: u32 = 1;

/// Discriminator of every action sent to the VM controller.
pub const SNAPSHOT_ACTION_TYPE: &str = "COSMOS_SNAPSHOT";

/// Manifest filename, shared with the controller's export/import tooling.
pub const EXPORT_MANIFEST_FILENAME: &str = "export-manifest.json";

/// Trusted data filename written on restore.
pub const EXPORT_DATA_FILENAME: &str = "export-data.jsonl";

/// Permission bits of every staged file.
pub const EXPORTED_FILES_MODE: u32 = 0o644;

/// Invariant: the host may only retrieve the snapshot it initiated.
pub fn invariant_matching_height(requested: u64, expected: u64) -> Result<(), SnapshotError> {
    if requested != expected {
        return Err(SnapshotError::UnexpectedHeight {
            requested,
            expected,
        });
    }
    Ok(())
}

/// Invariant: a staged export must describe the height being retrieved.
pub fn invariant_manifest_height(manifest: u64, expected: u64) -> Result<(), SnapshotError> {
    if manifest != expected {
        return Err(SnapshotError::ManifestHeightMismatch { manifest, expected });
    }
    Ok(())
}

/// Invariant: restores only accept the single supported payload format.
pub fn invariant_supported_format(format: u32) -> Result<(), SnapshotError> {
    if format != SNAPSHOT_FORMAT {
        return Err(SnapshotError::UnknownFormat(format));
    }
    Ok(())
}

/// Invariant: manifest filenames stay inside the export directory.
///
/// Only plain relative components are accepted; a root, a drive prefix or
/// `..` would let `Path::join` leave the directory.
pub fn invariant_contained_artifact_path(file: &str) -> Result<(), SnapshotError> {
    let contained = !file.is_empty()
        && Path::new(file)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !contained {
        return Err(SnapshotError::UncontainedArtifactPath(file.to_string()));
    }
    Ok(())
}
