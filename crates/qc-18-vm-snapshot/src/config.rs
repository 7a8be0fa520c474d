//! # VM Snapshot Configuration
//!
//! Staging locations and logging settings for the snapshot subsystem.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Default prefix of restore staging directories.
pub const DEFAULT_RESTORE_DIR_PREFIX: &str = "qc-state-sync-restore";

/// VM snapshot configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmSnapshotConfig {
    /// Directory under which restore staging directories are created.
    /// `None` uses the OS temp directory.
    pub staging_root: Option<PathBuf>,

    /// Prefix of restore staging directories (`<prefix>-<height>-<random>`).
    pub restore_dir_prefix: String,

    /// Log filter directive used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Emit JSON log lines instead of plain text.
    pub json_logs: bool,
}

impl Default for VmSnapshotConfig {
    fn default() -> Self {
        Self {
            staging_root: None,
            restore_dir_prefix: DEFAULT_RESTORE_DIR_PREFIX.to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl VmSnapshotConfig {
    /// Create a config for testing, staging under `staging_root`.
    pub fn for_testing(staging_root: impl Into<PathBuf>) -> Self {
        Self {
            staging_root: Some(staging_root.into()),
            log_level: "debug".to_string(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            staging_root: env::var("QC_SNAPSHOT_STAGING_ROOT")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),

            restore_dir_prefix: env::var("QC_SNAPSHOT_RESTORE_PREFIX")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.restore_dir_prefix),

            log_level: env::var("QC_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            json_logs: env::var("QC_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.json_logs),
        }
    }

    /// Root directory for restore staging.
    pub fn staging_root_or_temp(&self) -> PathBuf {
        self.staging_root.clone().unwrap_or_else(env::temp_dir)
    }
}
