//! Connection lifecycle and event entry points.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::domain::capabilities::ServerCapabilities;
use crate::engine::streamer::UpdateStreamer;
use crate::engine::transport::Transport;
use crate::engine::window::ReceiveWindow;
use crate::engine::{AcceptError, ConnectionError, EngineConfig};
use crate::framebuffer::Framebuffer;
use crate::input::KeyInjector;
use crate::protocol::codec::{decode_client_message, ProtocolError};
use crate::protocol::handshake::{HandshakeStep, Negotiator, Phase};
use crate::protocol::messages::{
    ClientMessage, Encoding, PixelFormat, ProtocolVersion, SERVER_VERSION_LINE,
};

/// The external services a connection reads from and writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub framebuffer: Arc<dyn Framebuffer>,
    pub injector: Arc<dyn KeyInjector>,
}

/// One client session.
///
/// Owns every piece of per-connection state, including the scratch buffer
/// inside the streamer. [`Connection::close`] consumes the value, so no
/// event handler can run after teardown.
pub struct Connection {
    capabilities: Arc<ServerCapabilities>,
    collaborators: Collaborators,
    negotiator: Negotiator,
    window: ReceiveWindow,
    streamer: UpdateStreamer,
    client_format: PixelFormat,
    encodings: Vec<Encoding>,
}

impl Connection {
    /// Sets up a connection and sends the server's version line.
    ///
    /// `capabilities` should have been refreshed from the framebuffer just
    /// before the call; the connection keeps it for its whole life.
    ///
    /// # Errors
    ///
    /// - [`AcceptError::NoFramebuffer`] if there is no display to serve.
    /// - [`AcceptError::ResourceExhausted`] if buffers cannot be allocated.
    /// - [`AcceptError::Transport`] if the version line cannot be sent.
    pub fn accept(
        capabilities: Arc<ServerCapabilities>,
        collaborators: Collaborators,
        config: EngineConfig,
        transport: &mut dyn Transport,
    ) -> Result<Self, AcceptError> {
        if collaborators.framebuffer.current_mode().is_none() || !capabilities.has_pixel_format() {
            warn!("refusing connection: no framebuffer");
            return Err(AcceptError::NoFramebuffer);
        }

        let streamer = UpdateStreamer::new(
            &config,
            capabilities.width,
            capabilities.height,
            capabilities.pixel_format.bytes_per_pixel(),
        )
        .map_err(|e| AcceptError::ResourceExhausted(e.to_string()))?;

        transport.send(SERVER_VERSION_LINE)?;
        transport.flush()?;

        info!("connection accepted");
        Ok(Self {
            client_format: capabilities.pixel_format,
            capabilities,
            collaborators,
            negotiator: Negotiator::new(),
            window: ReceiveWindow::new(config.receive_window),
            streamer,
            encodings: Vec::new(),
        })
    }

    /// Handles bytes delivered by the transport.
    ///
    /// # Errors
    ///
    /// Any error is fatal: window overflow, a protocol violation, or a
    /// handshake reply that could not be sent.
    pub fn on_receive(
        &mut self,
        bytes: &[u8],
        transport: &mut dyn Transport,
    ) -> Result<(), ConnectionError> {
        if let Err(overflow) = self.window.append(bytes) {
            warn!("{overflow}");
            return Err(overflow.into());
        }
        self.process_input(transport)?;

        if self.streamer.is_idle() && self.streamer.update_requested() {
            self.streamer
                .pump(self.collaborators.framebuffer.as_ref(), transport)?;
        }
        Ok(())
    }

    /// Handles a send-completion event.
    pub fn on_sent(&mut self, transport: &mut dyn Transport) -> Result<(), ConnectionError> {
        self.streamer
            .pump(self.collaborators.framebuffer.as_ref(), transport)
    }

    /// Handles a periodic tick.
    pub fn on_tick(&mut self, transport: &mut dyn Transport) -> Result<(), ConnectionError> {
        self.streamer
            .tick(self.collaborators.framebuffer.as_ref(), transport)
    }

    /// Tears the connection down, releasing the scratch buffer before the
    /// rest of the record.
    pub fn close(self) {
        info!("connection closed");
        let Connection {
            streamer, window, ..
        } = self;
        drop(streamer);
        drop(window);
    }

    pub fn phase(&self) -> Phase {
        self.negotiator.phase()
    }

    pub fn version(&self) -> Option<ProtocolVersion> {
        self.negotiator.version()
    }

    /// Pixel format most recently declared by the client.
    pub fn client_pixel_format(&self) -> &PixelFormat {
        &self.client_format
    }

    /// Encodings most recently declared by the client, in preference order.
    pub fn encodings(&self) -> &[Encoding] {
        &self.encodings
    }

    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    pub fn streamer(&self) -> &UpdateStreamer {
        &self.streamer
    }

    /// Negotiates and dispatches until the window is drained or holds only
    /// part of a message.
    fn process_input(&mut self, transport: &mut dyn Transport) -> Result<(), ConnectionError> {
        while !self.window.is_empty() {
            let consumed = if self.negotiator.is_complete() {
                match decode_client_message(self.window.pending()) {
                    Ok((msg, len)) => {
                        self.dispatch(msg);
                        len
                    }
                    Err(ProtocolError::InsufficientData { needed, .. }) => {
                        let capacity = self.window.capacity();
                        if needed > capacity {
                            warn!("message of {needed} bytes can never fit the window");
                            return Err(ProtocolError::MessageTooLarge {
                                declared: needed,
                                capacity,
                            }
                            .into());
                        }
                        break;
                    }
                    Err(e) => {
                        warn!("protocol violation: {e}");
                        return Err(e.into());
                    }
                }
            } else {
                match self
                    .negotiator
                    .advance(self.window.pending(), &self.capabilities)?
                {
                    HandshakeStep::NeedMore => break,
                    HandshakeStep::Reply { consumed, reply } => {
                        transport.send(&reply)?;
                        transport.flush()?;
                        consumed
                    }
                }
            };
            self.window.consumed(consumed);
            self.window.compact();
        }
        Ok(())
    }

    fn dispatch(&mut self, msg: ClientMessage) {
        debug!("dispatching {:?}", msg.kind());
        match msg {
            ClientMessage::SetPixelFormat(format) => {
                if format.is_valid() {
                    self.client_format = format;
                } else {
                    warn!("ignoring invalid pixel format {:?}", format);
                }
            }
            ClientMessage::SetEncodings(encodings) => {
                debug!("client encodings: {:?}", encodings);
                // Raw is always used; the list is kept for reference only.
                self.encodings = encodings;
            }
            ClientMessage::FramebufferUpdateRequest(req) => self.streamer.request(&req),
            ClientMessage::KeyEvent(key) => {
                if let Err(e) = self
                    .collaborators
                    .injector
                    .inject_key(key.keysym, key.down)
                {
                    debug!("key event dropped: {e}");
                }
            }
            ClientMessage::PointerEvent(p) => {
                trace!("pointer at ({}, {}) buttons {:#04x}", p.x, p.y, p.button_mask);
            }
            ClientMessage::ClientCutText { length } => {
                trace!("discarding {length} bytes of cut text");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
