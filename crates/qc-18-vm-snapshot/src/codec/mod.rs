//! # Codec Module
//!
//! On-disk staging formats shared with the VM controller, and the payload
//! encoding used on the host snapshot stream.
//!
//! ```text
//! <staging dir>/
//! ├── export-manifest.json   # {blockHeight, data?, artifacts: [[name, file], ...]}
//! ├── export-data.jsonl      # restore only: trusted [path, value] lines
//! └── <n>-<sanitized name>   # one file per artifact
//! ```

pub mod data_file;
pub mod manifest;
pub mod payload;

pub use data_file::{decode_data_entries, encode_data_entries, encode_data_line};
pub use manifest::{decode_manifest, encode_manifest, sanitize_artifact_name, staged_filename};
pub use payload::{decode_payload, encode_payload};
