//! The per-connection protocol engine.
//!
//! A [`Connection`] is driven entirely by three events supplied by the
//! transport adapter:
//!
//! | Event              | Entry point                 | Work done                          |
//! |--------------------|-----------------------------|------------------------------------|
//! | bytes arrived      | [`Connection::on_receive`]  | reassemble, negotiate, dispatch    |
//! | send buffer drained| [`Connection::on_sent`]     | resume the update stream           |
//! | periodic tick      | [`Connection::on_tick`]     | resume the stream, deferred retry  |
//!
//! Each call runs to completion and never blocks. "Need more input" and
//! "transport full" are both expressed by returning `Ok(())` with the state
//! saved for the next event. Any `Err` means the adapter must tear the
//! connection down with [`Connection::close`].

pub mod connection;
pub mod streamer;
pub mod transport;
pub mod window;

pub use connection::{Collaborators, Connection};
pub use streamer::{SendState, UpdateStreamer};
pub use transport::{SendError, Transport};
pub use window::{ReceiveWindow, WindowOverflow};

use thiserror::Error;

use crate::protocol::codec::ProtocolError;

/// Tunables for the engine. Defaults match what common viewers handle well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Capacity of the receive window in bytes.
    pub receive_window: usize,
    pub grid_columns: u16,
    pub grid_rows: u16,
    /// Largest single write of pixel data.
    pub max_segment: usize,
    /// Ticks to wait after a pass that found nothing to send.
    pub retry_ticks: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            receive_window: 1536,
            grid_columns: 8,
            grid_rows: 8,
            max_segment: 1400,
            retry_ticks: 2,
        }
    }
}

/// Why a connection could not be set up.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AcceptError {
    /// Memory for the connection's buffers could not be allocated.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// There is no framebuffer with a usable pixel format to serve.
    #[error("no framebuffer available")]
    NoFramebuffer,

    /// The opening version line could not be sent.
    #[error("transport error: {0}")]
    Transport(#[from] SendError),
}

/// A fatal condition on an established connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Overflow(#[from] WindowOverflow),

    #[error("transport error: {0}")]
    Transport(#[from] SendError),

    /// The framebuffer changed size after ServerInit. The viewer has to
    /// reconnect to learn the new geometry.
    #[error("screen changed from {advertised:?} to {current:?} after ServerInit")]
    ModeChanged {
        advertised: (u16, u16),
        current: (u16, u16),
    },
}
