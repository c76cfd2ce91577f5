//! Bounded receive window.
//!
//! ```text
//!  0          read        write            capacity
//!  ├──────────┼───────────┼────────────────┤
//!   consumed    pending     free
//! ```
//!
//! `0 ≤ read ≤ write ≤ capacity` holds after every operation. Bytes are
//! appended at `write`, consumed from `read`, and [`ReceiveWindow::compact`]
//! moves whatever is still pending back to offset zero.

use thiserror::Error;

/// More bytes arrived than the window has room for.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("receive window overflow: {incoming} bytes arrived, {remaining} bytes free")]
pub struct WindowOverflow {
    pub incoming: usize,
    pub remaining: usize,
}

/// Fixed-capacity reassembly buffer for client input.
#[derive(Debug)]
pub struct ReceiveWindow {
    buf: Box<[u8]>,
    read: usize,
    write: usize,
}

impl ReceiveWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity].into_boxed_slice(),
            read: 0,
            write: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Free space after the fill mark.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.write
    }

    /// Bytes appended but not yet consumed.
    pub fn pending(&self) -> &[u8] {
        &self.buf[self.read..self.write]
    }

    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    /// Appends `bytes` at the fill mark.
    ///
    /// # Errors
    ///
    /// Returns [`WindowOverflow`] if `bytes` does not fit in the free space.
    /// Nothing is written in that case.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), WindowOverflow> {
        let remaining = self.remaining();
        if bytes.len() > remaining {
            return Err(WindowOverflow {
                incoming: bytes.len(),
                remaining,
            });
        }
        self.buf[self.write..self.write + bytes.len()].copy_from_slice(bytes);
        self.write += bytes.len();
        Ok(())
    }

    /// Marks `n` pending bytes as consumed. Clamped to what is pending.
    pub fn consumed(&mut self, n: usize) {
        self.read = (self.read + n).min(self.write);
    }

    /// Moves pending bytes to offset zero, or resets to empty if none remain.
    pub fn compact(&mut self) {
        if self.read == self.write {
            self.read = 0;
            self.write = 0;
            return;
        }
        if self.read > 0 {
            self.buf.copy_within(self.read..self.write, 0);
            self.write -= self.read;
            self.read = 0;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_then_consume_then_compact_restores_full_capacity() {
        // Arrange
        let mut w = ReceiveWindow::new(16);
        w.append(b"abcdef").unwrap();

        // Act
        w.consumed(6);
        w.compact();

        // Assert
        assert!(w.is_empty());
        assert_eq!(w.remaining(), 16);
    }

    #[test]
    fn test_compact_moves_remainder_to_front() {
        let mut w = ReceiveWindow::new(8);
        w.append(b"abcdef").unwrap();
        w.consumed(4);

        w.compact();

        assert_eq!(w.pending(), b"ef");
        assert_eq!(w.remaining(), 6);
    }

    #[test]
    fn test_append_beyond_capacity_is_rejected_whole() {
        // Arrange
        let mut w = ReceiveWindow::new(8);
        w.append(b"abcde").unwrap();

        // Act
        let err = w.append(b"wxyz").unwrap_err();

        // Assert
        assert_eq!(
            err,
            WindowOverflow {
                incoming: 4,
                remaining: 3
            }
        );
        assert_eq!(w.pending(), b"abcde");
    }

    #[test]
    fn test_exact_fit_is_accepted() {
        let mut w = ReceiveWindow::new(4);
        w.append(b"abcd").unwrap();
        assert_eq!(w.remaining(), 0);
        assert!(w.append(b"").is_ok());
    }

    #[test]
    fn test_consumed_is_clamped_to_pending() {
        let mut w = ReceiveWindow::new(8);
        w.append(b"abc").unwrap();
        w.consumed(100);
        assert!(w.is_empty());
        assert!(w.pending().is_empty());
    }

    #[test]
    fn test_consumed_space_is_not_reused_until_compact() {
        let mut w = ReceiveWindow::new(4);
        w.append(b"abcd").unwrap();
        w.consumed(2);
        assert!(w.append(b"x").is_err());

        w.compact();
        assert!(w.append(b"xy").is_ok());
        assert_eq!(w.pending(), b"cdxy");
    }
}
