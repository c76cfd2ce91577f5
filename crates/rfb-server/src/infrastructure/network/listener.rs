//! TCP accept loop for RFB viewers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rfb_core::{Collaborators, EngineConfig, ServerCapabilities};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use super::session::{handle_session, SessionContext};
use crate::infrastructure::storage::config::AppConfig;

/// Poll interval for the `running` flag while waiting for connections.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("configuration error: {0}")]
    Config(#[from] crate::infrastructure::storage::config::ConfigError),
}

/// Accepts viewers and runs one session task per connection.
pub struct RfbServer {
    listener: TcpListener,
    name: String,
    collaborators: Collaborators,
    engine: EngineConfig,
    tick_interval: Duration,
    read_chunk: usize,
    send_buffer: usize,
    max_connections: usize,
    active: Arc<AtomicUsize>,
}

impl RfbServer {
    /// Binds the listening socket described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Config`] for an unusable bind address and
    /// [`ListenerError::BindFailed`] if the socket cannot be bound.
    pub async fn bind(config: &AppConfig, collaborators: Collaborators) -> Result<Self, ListenerError> {
        let addr = config.bind_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::BindFailed { addr, source })?;

        Ok(Self {
            listener,
            name: config.server.name.clone(),
            collaborators,
            engine: config.engine_config(),
            tick_interval: config.tick_interval(),
            read_chunk: config.network.read_chunk,
            send_buffer: config.network.send_buffer,
            max_connections: config.network.max_connections,
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Address actually bound; useful when the configured port is 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Number of sessions currently running.
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Accepts connections until `running` is cleared.
    pub async fn run(&self, running: Arc<AtomicBool>) {
        info!("RFB server listening on {:?}", self.listener.local_addr());

        loop {
            if !running.load(Ordering::SeqCst) {
                break;
            }

            match timeout(ACCEPT_POLL, self.listener.accept()).await {
                Ok(Ok((stream, peer))) => self.admit(stream, peer, &running),
                Ok(Err(e)) => error!("accept error: {e}"),
                Err(_) => {}
            }
        }

        info!("RFB server stopped");
    }

    fn admit(&self, stream: TcpStream, peer: SocketAddr, running: &Arc<AtomicBool>) {
        if self.active.load(Ordering::SeqCst) >= self.max_connections {
            warn!("rejecting {peer}: {} sessions already open", self.max_connections);
            drop(stream);
            return;
        }
        if let Err(e) = stream.set_nodelay(true) {
            warn!("set_nodelay failed for {peer}: {e}");
        }

        // Each viewer sees the display as it is at accept time.
        let capabilities = ServerCapabilities::new(self.name.as_str())
            .refreshed(self.collaborators.framebuffer.current_mode().as_ref());
        let ctx = SessionContext {
            capabilities: Arc::new(capabilities),
            collaborators: self.collaborators.clone(),
            engine: self.engine,
            tick_interval: self.tick_interval,
            read_chunk: self.read_chunk,
            send_buffer: self.send_buffer,
            running: Arc::clone(running),
        };

        let session_id = Uuid::new_v4();
        let span = tracing::info_span!("session", id = %session_id, %peer);
        let active = Arc::clone(&self.active);
        active.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(
            async move {
                info!("viewer connected");
                handle_session(stream, ctx).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }
            .instrument(span),
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
