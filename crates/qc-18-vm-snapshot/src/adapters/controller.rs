//! Controller transport over a blocking host callback.
//!
//! Hosts usually reach the VM controller through a synchronous bridge (an
//! FFI call or a pipe round trip). The callback runs on tokio's blocking
//! pool so the snapshot task never stalls a runtime worker.

use crate::domain::SnapshotError;
use crate::ports::outbound::ControllerTransport;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Blocking send callback: `(need_reply, message) -> reply`.
pub type SendFn = dyn Fn(bool, String) -> Result<String, String> + Send + Sync;

/// [`ControllerTransport`] backed by a blocking callback.
#[derive(Clone)]
pub struct FnControllerTransport {
    send: Arc<SendFn>,
}

impl FnControllerTransport {
    /// Wrap a blocking send callback.
    pub fn new<F>(send: F) -> Self
    where
        F: Fn(bool, String) -> Result<String, String> + Send + Sync + 'static,
    {
        Self {
            send: Arc::new(send),
        }
    }
}

impl fmt::Debug for FnControllerTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnControllerTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl ControllerTransport for FnControllerTransport {
    async fn send(&self, need_reply: bool, message: String) -> Result<String, SnapshotError> {
        let send = Arc::clone(&self.send);
        debug!("[qc-18] Controller round trip ({} bytes)", message.len());
        tokio::task::spawn_blocking(move || send(need_reply, message))
            .await
            .map_err(|e| SnapshotError::Transport(format!("controller call aborted: {e}")))?
            .map_err(SnapshotError::Transport)
    }
}
