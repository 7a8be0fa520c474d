//! Logging setup.
//!
//! Hosts that already install a global subscriber can skip this; every
//! event of this crate is emitted through `tracing` either way.

use crate::config::VmSnapshotConfig;
use crate::domain::SnapshotError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global subscriber configured from `config`.
///
/// `RUST_LOG` takes precedence over `config.log_level`.
pub fn init_logging(config: &VmSnapshotConfig) -> Result<(), SnapshotError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| SnapshotError::Telemetry(e.to_string()))?;

    if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| SnapshotError::Telemetry(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| SnapshotError::Telemetry(e.to_string()))?;
    }

    tracing::info!(
        log_level = %config.log_level,
        json = config.json_logs,
        "[qc-18] Logging initialized"
    );
    Ok(())
}

/// Debug-level logging captured by the test harness. Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
