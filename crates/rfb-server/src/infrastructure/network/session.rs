//! One viewer session: drives a [`Connection`] from a TCP socket.
//!
//! The loop waits on three sources and turns each into an engine event:
//!
//! - socket readable → [`Connection::on_receive`]
//! - socket writable while bytes are queued → write, then [`Connection::on_sent`]
//! - interval tick → [`Connection::on_tick`]
//!
//! The engine never touches the socket; it only writes into the session's
//! [`SendBuffer`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rfb_core::{AcceptError, Collaborators, Connection, ConnectionError, EngineConfig};
use rfb_core::ServerCapabilities;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::send_buffer::SendBuffer;

/// Why a session ended abnormally.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection refused by engine: {0}")]
    Accept(#[from] AcceptError),

    #[error("connection failed: {0}")]
    Connection(#[from] ConnectionError),
}

/// How a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The viewer closed its side of the socket.
    PeerClosed,
    /// The server is shutting down.
    Shutdown,
}

/// Everything a session needs besides its socket.
#[derive(Clone)]
pub struct SessionContext {
    pub capabilities: Arc<ServerCapabilities>,
    pub collaborators: Collaborators,
    pub engine: EngineConfig,
    pub tick_interval: Duration,
    pub read_chunk: usize,
    pub send_buffer: usize,
    pub running: Arc<AtomicBool>,
}

/// Runs one session until the peer disconnects, the engine reports a fatal
/// error, or `ctx.running` is cleared.
///
/// # Errors
///
/// Returns [`SessionError`] for socket failures and for any error the engine
/// reports. The socket is shut down in every case.
pub async fn run_session(
    mut stream: TcpStream,
    ctx: SessionContext,
) -> Result<SessionEnd, SessionError> {
    let mut out = SendBuffer::new(ctx.send_buffer);
    let mut conn = Connection::accept(
        Arc::clone(&ctx.capabilities),
        ctx.collaborators.clone(),
        ctx.engine,
        &mut out,
    )?;

    let result = drive(&mut stream, &mut conn, &mut out, &ctx).await;

    conn.close();
    drop(out);
    if let Err(e) = stream.shutdown().await {
        debug!("socket shutdown: {e}");
    }
    result
}

async fn drive(
    stream: &mut TcpStream,
    conn: &mut Connection,
    out: &mut SendBuffer,
    ctx: &SessionContext,
) -> Result<SessionEnd, SessionError> {
    let (mut reader, mut writer) = stream.split();
    let mut inbound = vec![0u8; ctx.read_chunk];
    let mut ticker = tokio::time::interval(ctx.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            read = reader.read(&mut inbound) => {
                let n = read?;
                if n == 0 {
                    return Ok(SessionEnd::PeerClosed);
                }
                conn.on_receive(&inbound[..n], out)?;
            }
            written = writer.write(out.pending()), if !out.is_empty() => {
                let n = written?;
                out.consume(n);
                conn.on_sent(out)?;
            }
            _ = ticker.tick() => {
                if !ctx.running.load(Ordering::SeqCst) {
                    return Ok(SessionEnd::Shutdown);
                }
                conn.on_tick(out)?;
            }
        }
    }
}

/// Runs a session and logs how it ended.
pub async fn handle_session(stream: TcpStream, ctx: SessionContext) {
    match run_session(stream, ctx).await {
        Ok(SessionEnd::PeerClosed) => info!("viewer disconnected"),
        Ok(SessionEnd::Shutdown) => info!("session closed for shutdown"),
        Err(SessionError::Io(e)) => warn!("session ended: socket error: {e}"),
        Err(e) => warn!("session ended: {e}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rfb_core::{Framebuffer, MemoryFramebuffer, ScancodeQueue};
    use tokio::net::TcpListener;

    fn context(fb: Arc<MemoryFramebuffer>) -> SessionContext {
        SessionContext {
            capabilities: Arc::new(
                ServerCapabilities::new("test").refreshed(fb.current_mode().as_ref()),
            ),
            collaborators: Collaborators {
                framebuffer: fb,
                injector: Arc::new(ScancodeQueue::new(16)),
            },
            engine: EngineConfig::default(),
            tick_interval: Duration::from_millis(20),
            read_chunk: 256,
            send_buffer: 4096,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    async fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn test_session_sends_version_line_first() {
        // Arrange
        let (server, mut client) = pair().await;
        let ctx = context(Arc::new(MemoryFramebuffer::new(16, 16)));
        let task = tokio::spawn(run_session(server, ctx));

        // Act
        let mut line = [0u8; 12];
        client.read_exact(&mut line).await.unwrap();
        drop(client);

        // Assert
        assert_eq!(&line, b"RFB 003.008\n");
        let end = task.await.unwrap().unwrap();
        assert_eq!(end, SessionEnd::PeerClosed);
    }

    #[tokio::test]
    async fn test_session_bad_version_ends_with_protocol_error() {
        let (server, mut client) = pair().await;
        let ctx = context(Arc::new(MemoryFramebuffer::new(16, 16)));
        let task = tokio::spawn(run_session(server, ctx));

        let mut line = [0u8; 12];
        client.read_exact(&mut line).await.unwrap();
        client.write_all(b"HELLO WORLD\n").await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(SessionError::Connection(ConnectionError::Protocol(_)))));
    }

    #[tokio::test]
    async fn test_session_refused_without_display() {
        let (server, _client) = pair().await;
        let fb = Arc::new(MemoryFramebuffer::new(16, 16));
        let mut ctx = context(Arc::clone(&fb));
        ctx.capabilities = Arc::new(ServerCapabilities::new("test"));

        let result = run_session(server, ctx).await;

        assert!(matches!(result, Err(SessionError::Accept(AcceptError::NoFramebuffer))));
    }

    #[tokio::test]
    async fn test_session_stops_when_running_cleared() {
        let (server, mut client) = pair().await;
        let ctx = context(Arc::new(MemoryFramebuffer::new(16, 16)));
        let running = Arc::clone(&ctx.running);
        let task = tokio::spawn(run_session(server, ctx));

        let mut line = [0u8; 12];
        client.read_exact(&mut line).await.unwrap();
        running.store(false, Ordering::SeqCst);

        let end = task.await.unwrap().unwrap();
        assert_eq!(end, SessionEnd::Shutdown);
    }
}
