//! Network infrastructure for the RFB server.
//!
//! # Sub-modules
//!
//! - **`listener`** – Binds the TCP socket, enforces the connection limit and
//!   spawns one task per viewer.
//!
//! - **`session`** – The per-viewer loop that turns socket readiness and a
//!   periodic timer into engine events.
//!
//! - **`send_buffer`** – The bounded outbound queue the engine writes into.
//!   A full queue is how socket backpressure reaches the engine.

pub mod listener;
pub mod send_buffer;
pub mod session;

pub use listener::{ListenerError, RfbServer};
pub use send_buffer::SendBuffer;
pub use session::{run_session, SessionContext, SessionEnd, SessionError};
