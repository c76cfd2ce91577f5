//! Bounded scancode queue.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use tracing::{trace, warn};

use crate::input::scancode::keysym_to_scancode;
use crate::input::{InjectError, KeyInjector};

/// A FIFO of scancode bytes waiting to be read by the keyboard port.
///
/// A key's bytes (prefix and code) are queued together or not at all, so a
/// reader never sees a dangling `0xE0`.
pub struct ScancodeQueue {
    capacity: usize,
    bytes: Mutex<VecDeque<u8>>,
}

impl ScancodeQueue {
    /// Creates an empty queue holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            bytes: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Removes the oldest byte, if any.
    pub fn pop(&self) -> Option<u8> {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner).pop_front()
    }

    /// Number of queued bytes.
    pub fn len(&self) -> usize {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl KeyInjector for ScancodeQueue {
    fn inject_key(&self, keysym: u32, down: bool) -> Result<(), InjectError> {
        let Some(scancode) = keysym_to_scancode(keysym) else {
            warn!("unmapped keysym {keysym:#06x}");
            return Err(InjectError::UnmappedKeysym(keysym));
        };
        let bytes = scancode.bytes(down);

        let mut queue = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.len() + bytes.len() > self.capacity {
            warn!("scancode queue full; dropping keysym {keysym:#06x}");
            return Err(InjectError::QueueFull);
        }
        trace!("queued scancode {:02x?} for keysym {keysym:#06x}", bytes);
        queue.extend(bytes);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_and_release_queue_make_then_break() {
        // Arrange
        let queue = ScancodeQueue::new(8);

        // Act
        queue.inject_key(0x61, true).unwrap(); // a
        queue.inject_key(0x61, false).unwrap();

        // Assert
        assert_eq!(queue.pop(), Some(0x1E));
        assert_eq!(queue.pop(), Some(0x9E));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_extended_key_queues_prefix() {
        let queue = ScancodeQueue::new(8);
        queue.inject_key(0xFF52, true).unwrap(); // Up
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(0xE0));
        assert_eq!(queue.pop(), Some(0x48));
    }

    #[test]
    fn test_unmapped_keysym_is_rejected_without_queueing() {
        let queue = ScancodeQueue::new(8);
        assert_eq!(queue.inject_key(0x1234_5678, true), Err(InjectError::UnmappedKeysym(0x1234_5678)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_full_queue_rejects_whole_key() {
        // Arrange – one free byte left, extended key needs two
        let queue = ScancodeQueue::new(3);
        queue.inject_key(0x61, true).unwrap();
        queue.inject_key(0x62, true).unwrap();

        // Act
        let result = queue.inject_key(0xFF51, true);

        // Assert
        assert_eq!(result, Err(InjectError::QueueFull));
        assert_eq!(queue.len(), 2);
    }
}
