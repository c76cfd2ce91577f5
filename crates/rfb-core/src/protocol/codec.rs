//! Binary codec for the RFB records this server reads and writes.
//!
//! Client-to-server messages start with a one-byte opcode followed by a
//! fixed-size body. Two kinds carry a variable tail whose length is encoded
//! in the fixed part:
//!
//! ```text
//! SetEncodings   [2][pad:1][count:2][encoding:4 × count]
//! ClientCutText  [6][pad:3][length:4][text:length]
//! ```
//!
//! Decoding never consumes a partial message: if fewer bytes are buffered
//! than the message needs, [`ProtocolError::InsufficientData`] reports how
//! many are required and the caller retries once more data has arrived.

use thiserror::Error;

use crate::protocol::messages::{
    ClientMessage, Encoding, KeyEvent, MessageKind, PixelFormat, PointerEvent, ProtocolVersion,
    RectangleHeader, UpdateRequest, CLIENT_CUT_TEXT_FIXED_SIZE, FRAMEBUFFER_UPDATE,
    KEY_EVENT_SIZE, PIXEL_FORMAT_SIZE, POINTER_EVENT_SIZE, RECTANGLE_HEADER_SIZE,
    SECURITY_RESULT_OK, SECURITY_TYPE_NONE, SERVER_INIT_FIXED_SIZE, SET_ENCODINGS_FIXED_SIZE,
    SET_PIXEL_FORMAT_SIZE, UPDATE_REQUEST_SIZE,
};

/// Errors that can occur while decoding client input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Not enough bytes are buffered yet. This is the "need more" signal and
    /// is never fatal on its own.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The client's version line is not one of the recognised strings.
    #[error("unsupported protocol version line: {0:?}")]
    UnsupportedVersion(String),

    /// The leading opcode byte is not a known client message.
    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),

    /// The message declares a size that can never fit in the receive window.
    #[error("message of {declared} bytes exceeds receive window of {capacity} bytes")]
    MessageTooLarge { declared: usize, capacity: usize },

    /// A field could not be interpreted.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl ProtocolError {
    /// Returns `true` for the "need more bytes" condition.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, ProtocolError::InsufficientData { .. })
    }
}

// ── Client message decoding ───────────────────────────────────────────────────

/// Computes the total wire size of the client message at the start of
/// `bytes`, reading the count/length field of variable-size kinds.
///
/// # Errors
///
/// - [`ProtocolError::InsufficientData`] if the opcode or the fixed prefix
///   holding the length field is not yet buffered.
/// - [`ProtocolError::UnknownMessageType`] for an unrecognised opcode.
pub fn client_message_len(bytes: &[u8]) -> Result<usize, ProtocolError> {
    require_len(bytes, 1)?;
    match MessageKind::from(bytes[0]) {
        MessageKind::SetPixelFormat => Ok(SET_PIXEL_FORMAT_SIZE),
        MessageKind::SetEncodings => {
            require_len(bytes, SET_ENCODINGS_FIXED_SIZE)?;
            let count = usize::from(read_u16(bytes, 2));
            Ok(SET_ENCODINGS_FIXED_SIZE + 4 * count)
        }
        MessageKind::FramebufferUpdateRequest => Ok(UPDATE_REQUEST_SIZE),
        MessageKind::KeyEvent => Ok(KEY_EVENT_SIZE),
        MessageKind::PointerEvent => Ok(POINTER_EVENT_SIZE),
        MessageKind::ClientCutText => {
            require_len(bytes, CLIENT_CUT_TEXT_FIXED_SIZE)?;
            let length = read_u32(bytes, 4) as usize;
            Ok(CLIENT_CUT_TEXT_FIXED_SIZE.saturating_add(length))
        }
        MessageKind::Unknown(op) => Err(ProtocolError::UnknownMessageType(op)),
    }
}

/// Decodes one client message from the beginning of `bytes`.
///
/// Returns the message and the exact number of bytes it occupies, so the
/// caller can advance its read cursor by that amount.
///
/// # Errors
///
/// Returns [`ProtocolError::InsufficientData`] when the whole message is not
/// yet available, and [`ProtocolError::UnknownMessageType`] for an opcode
/// outside the dispatch table.
///
/// # Examples
///
/// ```rust
/// use rfb_core::protocol::codec::decode_client_message;
/// use rfb_core::protocol::messages::{ClientMessage, PointerEvent};
///
/// let bytes = [5, 0b001, 0, 10, 0, 20];
/// let (msg, consumed) = decode_client_message(&bytes).unwrap();
/// assert_eq!(consumed, 6);
/// assert_eq!(
///     msg,
///     ClientMessage::PointerEvent(PointerEvent { button_mask: 1, x: 10, y: 20 })
/// );
/// ```
pub fn decode_client_message(bytes: &[u8]) -> Result<(ClientMessage, usize), ProtocolError> {
    let total = client_message_len(bytes)?;
    require_len(bytes, total)?;
    let p = &bytes[..total];

    let msg = match MessageKind::from(p[0]) {
        MessageKind::SetPixelFormat => {
            let mut block = [0u8; PIXEL_FORMAT_SIZE];
            block.copy_from_slice(&p[4..4 + PIXEL_FORMAT_SIZE]);
            ClientMessage::SetPixelFormat(PixelFormat::from_bytes(&block))
        }
        MessageKind::SetEncodings => {
            let encodings = p[SET_ENCODINGS_FIXED_SIZE..]
                .chunks_exact(4)
                .map(|c| Encoding::from(i32::from_be_bytes([c[0], c[1], c[2], c[3]])))
                .collect();
            ClientMessage::SetEncodings(encodings)
        }
        MessageKind::FramebufferUpdateRequest => {
            ClientMessage::FramebufferUpdateRequest(UpdateRequest {
                incremental: p[1] != 0,
                x: read_u16(p, 2),
                y: read_u16(p, 4),
                width: read_u16(p, 6),
                height: read_u16(p, 8),
            })
        }
        MessageKind::KeyEvent => ClientMessage::KeyEvent(KeyEvent {
            down: p[1] != 0,
            keysym: read_u32(p, 4),
        }),
        MessageKind::PointerEvent => ClientMessage::PointerEvent(PointerEvent {
            button_mask: p[1],
            x: read_u16(p, 2),
            y: read_u16(p, 4),
        }),
        MessageKind::ClientCutText => ClientMessage::ClientCutText {
            length: read_u32(p, 4),
        },
        MessageKind::Unknown(op) => return Err(ProtocolError::UnknownMessageType(op)),
    };
    Ok((msg, total))
}

// ── Server record encoding ────────────────────────────────────────────────────

/// Encodes the security negotiation reply for the negotiated level.
///
/// ```text
/// 3.7 / 3.8 : [count=1][type=None][SecurityResult=OK:4]
/// 3.3       : [security-type=None:4]
/// ```
pub fn encode_security_reply(version: ProtocolVersion) -> Vec<u8> {
    if version.is_legacy() {
        u32::from(SECURITY_TYPE_NONE).to_be_bytes().to_vec()
    } else {
        let mut buf = Vec::with_capacity(6);
        buf.push(1);
        buf.push(SECURITY_TYPE_NONE);
        buf.extend_from_slice(&SECURITY_RESULT_OK.to_be_bytes());
        buf
    }
}

/// Encodes the ServerInit record.
///
/// The name is truncated to `u32::MAX` bytes, which is never reached in
/// practice.
pub fn encode_server_init(width: u16, height: u16, format: &PixelFormat, name: &str) -> Vec<u8> {
    let name = name.as_bytes();
    let mut buf = Vec::with_capacity(SERVER_INIT_FIXED_SIZE + name.len());
    buf.extend_from_slice(&width.to_be_bytes());
    buf.extend_from_slice(&height.to_be_bytes());
    buf.extend_from_slice(&format.to_bytes());
    buf.extend_from_slice(&(name.len() as u32).to_be_bytes());
    buf.extend_from_slice(name);
    buf
}

/// Encodes a FramebufferUpdate header announcing one raw rectangle.
pub fn encode_rectangle_header(rect: &RectangleHeader) -> [u8; RECTANGLE_HEADER_SIZE] {
    let mut b = [0u8; RECTANGLE_HEADER_SIZE];
    b[0] = FRAMEBUFFER_UPDATE;
    // b[1] is padding
    b[2..4].copy_from_slice(&1u16.to_be_bytes());
    b[4..6].copy_from_slice(&rect.x.to_be_bytes());
    b[6..8].copy_from_slice(&rect.y.to_be_bytes());
    b[8..10].copy_from_slice(&rect.width.to_be_bytes());
    b[10..12].copy_from_slice(&rect.height.to_be_bytes());
    b[12..16].copy_from_slice(&Encoding::Raw.id().to_be_bytes());
    b
}

// ── Primitive helpers ─────────────────────────────────────────────────────────

fn require_len(bytes: &[u8], needed: usize) -> Result<(), ProtocolError> {
    if bytes.len() < needed {
        Err(ProtocolError::InsufficientData {
            needed,
            available: bytes.len(),
        })
    } else {
        Ok(())
    }
}

fn read_u16(bytes: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([bytes[off], bytes[off + 1]])
}

fn read_u32(bytes: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn set_encodings(ids: &[i32]) -> Vec<u8> {
        let mut b = vec![2, 0];
        b.extend_from_slice(&(ids.len() as u16).to_be_bytes());
        for id in ids {
            b.extend_from_slice(&id.to_be_bytes());
        }
        b
    }

    fn cut_text(text: &[u8]) -> Vec<u8> {
        let mut b = vec![6, 0, 0, 0];
        b.extend_from_slice(&(text.len() as u32).to_be_bytes());
        b.extend_from_slice(text);
        b
    }

    // ── Sizes ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_every_opcode_consumes_exactly_its_declared_size() {
        let mut set_pixel_format = vec![0, 0, 0, 0];
        set_pixel_format.extend_from_slice(&PixelFormat::RGB888.to_bytes());

        let cases: Vec<(Vec<u8>, usize)> = vec![
            (set_pixel_format, 20),
            (set_encodings(&[]), 4),
            (set_encodings(&[0, 1, -239]), 16),
            (vec![3, 1, 0, 0, 0, 0, 4, 0, 3, 0], 10),
            (vec![4, 1, 0, 0, 0, 0, 0, 0x61], 8),
            (vec![5, 0, 0, 1, 0, 2], 6),
            (cut_text(b""), 8),
            (cut_text(b"hello"), 13),
        ];

        for (bytes, size) in cases {
            // Trailing bytes of a following message must not be consumed.
            let mut with_tail = bytes.clone();
            with_tail.extend_from_slice(&[3, 3, 3]);

            let (_, consumed) = decode_client_message(&with_tail).expect("decode");
            assert_eq!(consumed, size, "opcode {}", bytes[0]);
        }
    }

    #[test]
    fn test_set_encodings_maximal_count_fits_declared_size() {
        // Arrange – 255 encodings is far more than any real client sends
        let ids: Vec<i32> = (0..255).collect();
        let bytes = set_encodings(&ids);

        // Act
        let (msg, consumed) = decode_client_message(&bytes).unwrap();

        // Assert
        assert_eq!(consumed, 4 + 4 * 255);
        match msg {
            ClientMessage::SetEncodings(list) => assert_eq!(list.len(), 255),
            other => panic!("unexpected {other:?}"),
        }
    }

    // ── Incomplete input ──────────────────────────────────────────────────────

    #[test]
    fn test_decode_empty_bytes_needs_one_byte() {
        assert_eq!(
            decode_client_message(&[]),
            Err(ProtocolError::InsufficientData {
                needed: 1,
                available: 0
            })
        );
    }

    #[test]
    fn test_every_strict_prefix_is_incomplete() {
        let full = vec![3, 0, 0, 0, 0, 0, 0, 64, 0, 48];
        for cut in 0..full.len() {
            let err = decode_client_message(&full[..cut]).unwrap_err();
            assert!(err.is_incomplete(), "prefix of {cut} bytes");
        }
    }

    #[test]
    fn test_set_encodings_tail_shortfall_reports_total_needed() {
        let bytes = set_encodings(&[0, 1]);
        let err = decode_client_message(&bytes[..9]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InsufficientData {
                needed: 12,
                available: 9
            }
        );
    }

    #[test]
    fn test_cut_text_length_field_is_big_endian() {
        let mut bytes = vec![6, 0, 0, 0, 0, 0, 1, 0];
        assert_eq!(client_message_len(&bytes), Ok(8 + 256));
        bytes.resize(8 + 256, b'x');
        let (msg, consumed) = decode_client_message(&bytes).unwrap();
        assert_eq!(consumed, 264);
        assert_eq!(msg, ClientMessage::ClientCutText { length: 256 });
    }

    // ── Violations ────────────────────────────────────────────────────────────

    #[test]
    fn test_unknown_opcode_is_a_violation() {
        for op in [1u8, 7, 127, 255] {
            let err = decode_client_message(&[op, 0, 0, 0]).unwrap_err();
            assert_eq!(err, ProtocolError::UnknownMessageType(op));
            assert!(!err.is_incomplete());
        }
    }

    // ── Field decoding ────────────────────────────────────────────────────────

    #[test]
    fn test_decode_update_request_fields() {
        let bytes = [3, 1, 0, 16, 0, 32, 0x04, 0x00, 0x03, 0x00];
        let (msg, _) = decode_client_message(&bytes).unwrap();
        assert_eq!(
            msg,
            ClientMessage::FramebufferUpdateRequest(UpdateRequest {
                incremental: true,
                x: 16,
                y: 32,
                width: 1024,
                height: 768,
            })
        );
    }

    #[test]
    fn test_decode_key_event_fields() {
        let bytes = [4, 1, 0, 0, 0x00, 0x00, 0xFF, 0x0D];
        let (msg, _) = decode_client_message(&bytes).unwrap();
        assert_eq!(
            msg,
            ClientMessage::KeyEvent(KeyEvent {
                down: true,
                keysym: 0xFF0D
            })
        );
    }

    // ── Server records ────────────────────────────────────────────────────────

    #[test]
    fn test_security_reply_for_each_level() {
        assert_eq!(encode_security_reply(ProtocolVersion::Rfb38), vec![1, 1, 0, 0, 0, 0]);
        assert_eq!(encode_security_reply(ProtocolVersion::Rfb37), vec![1, 1, 0, 0, 0, 0]);
        assert_eq!(encode_security_reply(ProtocolVersion::Rfb33), vec![0, 0, 0, 1]);
    }

    #[test]
    fn test_server_init_layout() {
        // Act
        let bytes = encode_server_init(800, 600, &PixelFormat::RGB888, "desk");

        // Assert
        assert_eq!(bytes.len(), SERVER_INIT_FIXED_SIZE + 4);
        assert_eq!(&bytes[0..2], &800u16.to_be_bytes());
        assert_eq!(&bytes[2..4], &600u16.to_be_bytes());
        assert_eq!(&bytes[4..20], &PixelFormat::RGB888.to_bytes());
        assert_eq!(&bytes[20..24], &4u32.to_be_bytes());
        assert_eq!(&bytes[24..], b"desk");
    }

    #[test]
    fn test_rectangle_header_layout() {
        let hdr = encode_rectangle_header(&RectangleHeader {
            x: 128,
            y: 96,
            width: 128,
            height: 96,
        });
        assert_eq!(
            hdr,
            [0, 0, 0, 1, 0, 128, 0, 96, 0, 128, 0, 96, 0, 0, 0, 0]
        );
    }
}
