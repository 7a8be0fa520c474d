//! Staging manifest codec and artifact filename rules.

use crate::domain::{ExportManifest, SnapshotError};

/// Decode an `export-manifest.json` document.
pub fn decode_manifest(bytes: &[u8]) -> Result<ExportManifest, SnapshotError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Encode a manifest with two-space indentation so operators can read it.
pub fn encode_manifest(manifest: &ExportManifest) -> Result<Vec<u8>, SnapshotError> {
    Ok(serde_json::to_vec_pretty(manifest)?)
}

fn is_allowed_filename_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

/// Replace every character outside `[A-Za-z0-9._-]` with a hyphen.
///
/// Total and deterministic, but not unique: `"a/b"` and `"a b"` collide.
/// Callers needing uniqueness use [`staged_filename`].
pub fn sanitize_artifact_name(name: &str) -> String {
    name.chars()
        .map(|c| if is_allowed_filename_char(c) { c } else { '-' })
        .collect()
}

/// Filesystem-safe, collision-free filename for the `index`-th artifact.
pub fn staged_filename(index: usize, name: &str) -> String {
    format!("{}-{}", index, sanitize_artifact_name(name))
}
