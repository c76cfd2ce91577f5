//! # rfb-core
//!
//! A sans-I/O engine for the server side of the Remote Framebuffer (RFB)
//! protocol, the wire protocol spoken by VNC viewers.
//!
//! The crate owns no sockets and no runtime. A transport adapter feeds it
//! three kinds of event (bytes arrived, send buffer drained, periodic tick)
//! and hands it something implementing [`Transport`] to write into. Screen
//! contents and keyboard input are reached through the [`Framebuffer`] and
//! [`KeyInjector`] traits.
//!
//! # Architecture overview
//!
//! - **`protocol`** – Wire types, the client message codec and the
//!   version/security handshake. Supports RFB 3.3, 3.7 and 3.8 with the
//!   "None" security type and the Raw encoding.
//!
//! - **`engine`** – The per-connection [`Connection`]: a bounded receive
//!   window that reassembles client messages, a dispatcher, and an update
//!   streamer that walks the screen in chunks and sends only the ones whose
//!   checksum changed since they were last delivered.
//!
//! - **`domain`** – Values shared by the above: chunk geometry, the checksum
//!   cache and the capabilities advertised in ServerInit.
//!
//! - **`framebuffer`** / **`input`** – Collaborator traits plus in-memory
//!   implementations: an RGB888 framebuffer and a PC scancode queue.

pub mod domain;
pub mod engine;
pub mod framebuffer;
pub mod input;
pub mod protocol;

pub use domain::capabilities::{FramebufferMode, PixelLayout, ServerCapabilities};
pub use domain::grid::Rect;
pub use engine::{
    AcceptError, Collaborators, Connection, ConnectionError, EngineConfig, SendError, Transport,
};
pub use framebuffer::{Framebuffer, MemoryFramebuffer};
pub use input::{InjectError, KeyInjector, ScancodeQueue};
pub use protocol::codec::ProtocolError;
