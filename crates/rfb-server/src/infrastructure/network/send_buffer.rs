//! Bounded outbound buffer between the engine and a socket.
//!
//! The engine writes into a [`SendBuffer`] through the [`Transport`] trait;
//! the session loop drains it into the socket. When a write would push the
//! buffer past its capacity the whole write is refused with
//! [`SendError::WouldBlock`], which the engine treats as backpressure.

use rfb_core::{SendError, Transport};

/// A fixed-capacity byte queue implementing [`Transport`].
#[derive(Debug)]
pub struct SendBuffer {
    bytes: Vec<u8>,
    capacity: usize,
}

impl SendBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Bytes queued but not yet written to the socket.
    pub fn pending(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops the first `n` bytes after the socket accepted them.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.bytes.len());
        self.bytes.drain(..n);
    }
}

impl Transport for SendBuffer {
    fn send(&mut self, bytes: &[u8]) -> Result<(), SendError> {
        if self.bytes.len() + bytes.len() > self.capacity {
            return Err(SendError::WouldBlock);
        }
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
