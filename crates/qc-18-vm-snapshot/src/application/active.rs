//! The snapshot in flight and its start signal.

use crate::domain::{SnapshotError, SnapshotPhase};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info_span, Span};

/// One-shot outcome of the `initiate` round trip.
///
/// Any number of tasks may wait on it. An error is handed to the first
/// waiter only; later waiters see success.
pub(crate) struct StartSignal {
    done: watch::Sender<bool>,
    error: Mutex<Option<SnapshotError>>,
}

impl StartSignal {
    fn new() -> Self {
        let (done, _) = watch::channel(false);
        Self {
            done,
            error: Mutex::new(None),
        }
    }

    /// Publish the outcome and wake every waiter.
    pub(crate) fn resolve(&self, result: Result<(), SnapshotError>) {
        if let Err(e) = result {
            *self.error.lock() = Some(e);
        }
        self.done.send_replace(true);
    }

    /// True once an outcome was published.
    pub(crate) fn is_resolved(&self) -> bool {
        *self.done.borrow()
    }

    /// Wait for the outcome.
    pub(crate) async fn wait(&self) -> Result<(), SnapshotError> {
        let mut rx = self.done.subscribe();
        rx.wait_for(|done| *done)
            .await
            .map(|_| ())
            .map_err(|_| SnapshotError::Runtime("snapshot start signal dropped".to_string()))?;

        match self.error.lock().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// State of the single snapshot attempt allowed at a time.
pub(crate) struct ActiveSnapshot {
    height: u64,
    span: Span,
    started: StartSignal,
    phase: Mutex<SnapshotPhase>,
}

impl ActiveSnapshot {
    /// New attempt for `height`, already past `Idle`.
    pub(crate) fn new(height: u64) -> Self {
        Self {
            height,
            span: info_span!("vm_snapshot", height),
            started: StartSignal::new(),
            phase: Mutex::new(SnapshotPhase::Initiating),
        }
    }

    pub(crate) fn height(&self) -> u64 {
        self.height
    }

    /// Span every log line of this attempt is emitted in.
    pub(crate) fn span(&self) -> &Span {
        &self.span
    }

    pub(crate) fn started(&self) -> &StartSignal {
        &self.started
    }

    pub(crate) fn phase(&self) -> SnapshotPhase {
        *self.phase.lock()
    }

    /// Move to `next`, rejecting transitions the phase machine forbids.
    pub(crate) fn transition_to(&self, next: SnapshotPhase) -> Result<(), SnapshotError> {
        let mut phase = self.phase.lock();
        if !phase.can_transition_to(next) {
            return Err(SnapshotError::InvalidPhaseTransition {
                from: *phase,
                to: next,
            });
        }
        debug!("[qc-18] Snapshot {} phase {} -> {}", self.height, *phase, next);
        *phase = next;
        Ok(())
    }
}
