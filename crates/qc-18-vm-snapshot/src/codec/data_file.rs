//! `export-data.jsonl` codec: one `[path, value]` JSON array per line.

use crate::domain::{DataEntry, SnapshotError};

/// Encode a single entry as a newline-terminated JSON line.
pub fn encode_data_line(entry: &DataEntry) -> Result<Vec<u8>, SnapshotError> {
    let mut line = serde_json::to_vec(&[entry.path.as_str(), entry.value.as_str()])?;
    line.push(b'\n');
    Ok(line)
}

/// Encode all entries in order.
pub fn encode_data_entries(entries: &[DataEntry]) -> Result<Vec<u8>, SnapshotError> {
    let mut out = Vec::new();
    for entry in entries {
        out.extend(encode_data_line(entry)?);
    }
    Ok(out)
}

/// Decode a data file back into entries. Blank lines are skipped.
pub fn decode_data_entries(text: &str) -> Result<Vec<DataEntry>, SnapshotError> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| -> Result<DataEntry, SnapshotError> {
            let [path, value]: [String; 2] = serde_json::from_str(line)?;
            Ok(DataEntry { path, value })
        })
        .collect()
}
