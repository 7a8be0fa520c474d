//! JSON action round trips to the VM controller.

use crate::domain::{SnapshotAction, SnapshotError};
use crate::ports::outbound::ControllerTransport;
use std::sync::Arc;
use tracing::debug;

/// Serializes [`SnapshotAction`]s onto a [`ControllerTransport`].
#[derive(Clone)]
pub(crate) struct ActionChannel {
    transport: Arc<dyn ControllerTransport>,
}

impl ActionChannel {
    pub(crate) fn new(transport: Arc<dyn ControllerTransport>) -> Self {
        Self { transport }
    }

    /// Send `action` and wait for the controller's reply.
    pub(crate) async fn send(&self, action: &SnapshotAction) -> Result<String, SnapshotError> {
        let message = serde_json::to_string(action)?;
        debug!(
            "[qc-18] Sending {} action for height {}",
            action.request, action.block_height
        );
        self.transport.send(true, message).await
    }
}
