//! Artifact payload codec for the host snapshot stream.

use crate::domain::{ArtifactPayload, SnapshotError};
use prost::Message;

/// Encode an artifact for the host payload writer.
pub fn encode_payload(payload: &ArtifactPayload) -> Result<Vec<u8>, SnapshotError> {
    let mut buf = Vec::with_capacity(payload.encoded_len());
    payload.encode(&mut buf)?;
    Ok(buf)
}

/// Decode an artifact read from the host payload reader.
pub fn decode_payload(bytes: &[u8]) -> Result<ArtifactPayload, SnapshotError> {
    Ok(ArtifactPayload::decode(bytes)?)
}
