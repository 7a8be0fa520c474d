//! # Domain Entities
//!
//! Messages exchanged with the VM controller and the host snapshot stream.

use super::invariants::SNAPSHOT_ACTION_TYPE;
use super::value_objects::SnapshotRequest;
use serde::{Deserialize, Deserializer, Serialize};

/// Request sent to the VM controller.
///
/// Serializes as
/// `{"type":"COSMOS_SNAPSHOT","blockHeight":h,"request":"...","args":[...]}`
/// with `args` omitted when empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotAction {
    /// Constant action discriminator.
    #[serde(rename = "type")]
    pub action_type: String,
    /// Height the request refers to.
    pub block_height: u64,
    /// Request kind.
    pub request: SnapshotRequest,
    /// Opaque arguments (restore only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<serde_json::Value>,
}

impl SnapshotAction {
    /// Create an action without arguments.
    pub fn new(block_height: u64, request: SnapshotRequest) -> Self {
        Self {
            action_type: SNAPSHOT_ACTION_TYPE.to_string(),
            block_height,
            request,
            args: Vec::new(),
        }
    }

    /// Attach opaque arguments.
    pub fn with_args(mut self, args: Vec<serde_json::Value>) -> Self {
        self.args = args;
        self
    }
}

/// Staging manifest describing an export directory.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportManifest {
    /// Height of the exported state.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub block_height: u64,
    /// Filename of the trusted data export, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// `(artifact name, staged filename)` pairs in controller order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub artifacts: Vec<(String, String)>,
}

impl ExportManifest {
    /// Empty manifest for `block_height`.
    pub fn new(block_height: u64) -> Self {
        Self {
            block_height,
            ..Default::default()
        }
    }

    /// Number of artifacts listed.
    pub fn artifact_count(&self) -> usize {
        self.artifacts.len()
    }
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<(String, String)>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One artifact as carried by the host snapshot stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ArtifactPayload {
    /// Logical artifact name assigned by the controller.
    #[prost(string, tag = "1")]
    pub name: String,
    /// Raw artifact bytes.
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}
