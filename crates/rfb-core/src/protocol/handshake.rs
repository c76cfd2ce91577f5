//! Connection handshake state machine.
//!
//! ```text
//! Begin ──version line──▶ ClientInit ──(security type +) ClientInit──▶ Main
//! ```
//!
//! The negotiator never touches a transport: each successful step returns
//! the exact number of input bytes it consumed together with the reply the
//! caller must send (and flush) before processing further input.
//! `Main` is terminal; from then on the command dispatcher owns the input.

use tracing::{info, warn};

use crate::domain::capabilities::ServerCapabilities;
use crate::protocol::codec::{encode_security_reply, ProtocolError};
use crate::protocol::messages::{ProtocolVersion, VERSION_LINE_LEN};

/// Handshake phase of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the client's 12-byte version line.
    Begin,
    /// Waiting for the security-type selection (3.7+) and ClientInit.
    ClientInit,
    /// Handshake finished; client messages are dispatched.
    Main,
}

/// Outcome of one handshake step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeStep {
    /// Not enough input yet; nothing was consumed.
    NeedMore,
    /// `consumed` bytes were accepted; `reply` must be sent and flushed.
    Reply { consumed: usize, reply: Vec<u8> },
}

/// Tracks a connection's progress through version and security negotiation.
#[derive(Debug, Clone)]
pub struct Negotiator {
    phase: Phase,
    version: Option<ProtocolVersion>,
}

impl Negotiator {
    /// Creates a negotiator waiting for the client's version line.
    pub fn new() -> Self {
        Self {
            phase: Phase::Begin,
            version: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Negotiated protocol level, once the version line has been accepted.
    pub fn version(&self) -> Option<ProtocolVersion> {
        self.version
    }

    /// Returns `true` once the handshake has reached [`Phase::Main`].
    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Main
    }

    /// Advances the handshake using the bytes buffered at the front of the
    /// receive window.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnsupportedVersion`] when the version line is
    /// not one of the four recognised strings, and
    /// [`ProtocolError::MalformedPayload`] if called after the handshake has
    /// already completed.
    pub fn advance(
        &mut self,
        input: &[u8],
        capabilities: &ServerCapabilities,
    ) -> Result<HandshakeStep, ProtocolError> {
        match self.phase {
            Phase::Begin => {
                if input.len() < VERSION_LINE_LEN {
                    return Ok(HandshakeStep::NeedMore);
                }
                let line = &input[..VERSION_LINE_LEN];
                let version = ProtocolVersion::from_version_line(line).ok_or_else(|| {
                    warn!("version negotiation failed");
                    ProtocolError::UnsupportedVersion(String::from_utf8_lossy(line).into_owned())
                })?;

                info!("negotiated RFB 3.{}", version.minor());
                self.version = Some(version);
                self.phase = Phase::ClientInit;
                Ok(HandshakeStep::Reply {
                    consumed: VERSION_LINE_LEN,
                    reply: encode_security_reply(version),
                })
            }
            Phase::ClientInit => {
                let version = self.version.unwrap_or(ProtocolVersion::Rfb33);
                let needed = version.client_init_len();
                if input.len() < needed {
                    return Ok(HandshakeStep::NeedMore);
                }
                // The security-type selection and the shared flag are ignored.
                self.phase = Phase::Main;
                info!("sending server init ({}x{})", capabilities.width, capabilities.height);
                Ok(HandshakeStep::Reply {
                    consumed: needed,
                    reply: capabilities.encode(),
                })
            }
            Phase::Main => Err(ProtocolError::MalformedPayload(
                "handshake already complete".to_string(),
            )),
        }
    }
}

impl Default for Negotiator {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::PixelFormat;

    fn caps() -> ServerCapabilities {
        ServerCapabilities {
            name: "test".to_string(),
            width: 640,
            height: 480,
            pixel_format: PixelFormat::RGB888,
        }
    }

    fn run_to_main(line: &[u8], client_init: &[u8]) -> (Negotiator, Vec<Vec<u8>>) {
        let mut n = Negotiator::new();
        let mut replies = Vec::new();
        for chunk in [line, client_init] {
            match n.advance(chunk, &caps()).expect("advance") {
                HandshakeStep::Reply { consumed, reply } => {
                    assert_eq!(consumed, chunk.len());
                    replies.push(reply);
                }
                HandshakeStep::NeedMore => panic!("unexpected NeedMore"),
            }
        }
        (n, replies)
    }

    #[test]
    fn test_all_four_version_lines_reach_main() {
        for (line, init) in [
            (&b"RFB 003.003\n"[..], &[1u8][..]),
            (&b"RFB 003.005\n"[..], &[1u8][..]),
            (&b"RFB 003.007\n"[..], &[1u8, 1][..]),
            (&b"RFB 003.008\n"[..], &[1u8, 1][..]),
        ] {
            let (n, _) = run_to_main(line, init);
            assert!(n.is_complete(), "{:?}", String::from_utf8_lossy(line));
        }
    }

    #[test]
    fn test_legacy_alias_behaves_identically() {
        // Arrange / Act
        let (a, replies_a) = run_to_main(b"RFB 003.003\n", &[1]);
        let (b, replies_b) = run_to_main(b"RFB 003.005\n", &[1]);

        // Assert
        assert_eq!(a.version(), b.version());
        assert_eq!(replies_a, replies_b);
    }

    #[test]
    fn test_v38_replies_with_none_and_success() {
        let (_, replies) = run_to_main(b"RFB 003.008\n", &[1, 1]);
        assert_eq!(replies[0], vec![1, 1, 0, 0, 0, 0]);
        assert_eq!(replies[1], caps().encode());
    }

    #[test]
    fn test_short_version_line_needs_more_without_consuming() {
        let mut n = Negotiator::new();
        for cut in 0..12 {
            assert_eq!(
                n.advance(&b"RFB 003.008\n"[..cut], &caps()),
                Ok(HandshakeStep::NeedMore)
            );
            assert_eq!(n.phase(), Phase::Begin);
        }
    }

    #[test]
    fn test_v38_client_init_needs_two_bytes() {
        let mut n = Negotiator::new();
        n.advance(b"RFB 003.008\n", &caps()).unwrap();
        assert_eq!(n.advance(&[1], &caps()), Ok(HandshakeStep::NeedMore));
        assert_eq!(n.phase(), Phase::ClientInit);
    }

    #[test]
    fn test_unrecognised_version_line_fails() {
        for line in [
            &b"RFB 003.006\n"[..],
            &b"RFB 003.008\r"[..],
            &b"HTTP/1.1 200"[..],
            &[0u8; 12][..],
        ] {
            let mut n = Negotiator::new();
            let err = n.advance(line, &caps()).unwrap_err();
            assert!(matches!(err, ProtocolError::UnsupportedVersion(_)));
            assert_eq!(n.phase(), Phase::Begin);
        }
    }

    #[test]
    fn test_advance_after_main_is_an_error() {
        let (mut n, _) = run_to_main(b"RFB 003.008\n", &[1, 1]);
        assert!(n.advance(&[3], &caps()).is_err());
    }
}
