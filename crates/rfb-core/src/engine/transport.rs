//! Outbound byte sink used by the engine.

use thiserror::Error;

/// Why a send did not go through.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The outbound buffer cannot take these bytes right now. Transient; the
    /// engine retries on the next send-completion or tick.
    #[error("transport buffer full")]
    WouldBlock,

    /// The peer or the transport has gone away.
    #[error("transport closed")]
    Closed,
}

/// The write half of a connection as seen by the engine.
///
/// `send` is all-or-nothing: either every byte is queued or none is.
pub trait Transport {
    /// Queues `bytes` for transmission.
    ///
    /// # Errors
    ///
    /// See [`SendError`].
    fn send(&mut self, bytes: &[u8]) -> Result<(), SendError>;

    /// Asks the transport to start transmitting what has been queued.
    fn flush(&mut self) -> Result<(), SendError> {
        Ok(())
    }
}

/// An unbounded in-memory sink; never blocks.
impl Transport for Vec<u8> {
    fn send(&mut self, bytes: &[u8]) -> Result<(), SendError> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}
