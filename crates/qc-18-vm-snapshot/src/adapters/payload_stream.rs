//! In-memory extension payload streams.
//!
//! Used by hosts that buffer a whole extension section before writing it to
//! their snapshot store, and by tests.

use crate::domain::SnapshotError;
use crate::ports::inbound::{ExtensionPayloadReader, ExtensionPayloadWriter};
use async_trait::async_trait;
use std::collections::VecDeque;

/// Collects payloads written by the extension.
#[derive(Debug, Default)]
pub struct BufferedPayloadWriter {
    payloads: Vec<Vec<u8>>,
}

impl BufferedPayloadWriter {
    /// Number of payloads written so far.
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    /// True if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Payloads in write order.
    pub fn into_payloads(self) -> Vec<Vec<u8>> {
        self.payloads
    }
}

#[async_trait]
impl ExtensionPayloadWriter for BufferedPayloadWriter {
    async fn write(&mut self, payload: Vec<u8>) -> Result<(), SnapshotError> {
        self.payloads.push(payload);
        Ok(())
    }
}

/// Replays buffered payloads to the extension, then signals the boundary.
#[derive(Debug, Default)]
pub struct BufferedPayloadReader {
    payloads: VecDeque<Vec<u8>>,
}

impl BufferedPayloadReader {
    /// Reader over `payloads`, in order.
    pub fn new(payloads: Vec<Vec<u8>>) -> Self {
        Self {
            payloads: payloads.into(),
        }
    }

    /// Payloads not yet read.
    pub fn remaining(&self) -> usize {
        self.payloads.len()
    }
}

#[async_trait]
impl ExtensionPayloadReader for BufferedPayloadReader {
    async fn read(&mut self) -> Result<Option<Vec<u8>>, SnapshotError> {
        Ok(self.payloads.pop_front())
    }
}
