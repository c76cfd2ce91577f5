//! RFB protocol message types.
//!
//! Every multi-byte field on the wire is big-endian ("network byte order").
//! Only the subset of the protocol that this server speaks is modelled here:
//! the handshake records, the six client-to-server messages, and the single
//! server-to-client rectangle update (raw encoding only).

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Length of a protocol version line, e.g. `"RFB 003.008\n"`.
pub const VERSION_LINE_LEN: usize = 12;

/// The version line the server announces as soon as a connection is accepted.
pub const SERVER_VERSION_LINE: &[u8; VERSION_LINE_LEN] = b"RFB 003.008\n";

/// Security type "None" (no authentication).
pub const SECURITY_TYPE_NONE: u8 = 1;

/// SecurityResult value meaning "OK".
pub const SECURITY_RESULT_OK: u32 = 0;

/// Size of the pixel-format block inside ServerInit and SetPixelFormat.
pub const PIXEL_FORMAT_SIZE: usize = 16;

/// Fixed part of the ServerInit record (width + height + pixel format + name length).
pub const SERVER_INIT_FIXED_SIZE: usize = 2 + 2 + PIXEL_FORMAT_SIZE + 4;

/// Size of a FramebufferUpdate message carrying exactly one rectangle header.
pub const RECTANGLE_HEADER_SIZE: usize = 16;

/// Server-to-client message type of FramebufferUpdate.
pub const FRAMEBUFFER_UPDATE: u8 = 0;

// ── Client message sizes ──────────────────────────────────────────────────────

/// SetPixelFormat: type + 3 padding + 16-byte format.
pub const SET_PIXEL_FORMAT_SIZE: usize = PIXEL_FORMAT_SIZE + 4;
/// SetEncodings fixed prefix: type + padding + 2-byte count.
pub const SET_ENCODINGS_FIXED_SIZE: usize = 4;
/// FramebufferUpdateRequest: type + incremental + x + y + width + height.
pub const UPDATE_REQUEST_SIZE: usize = 10;
/// KeyEvent: type + down-flag + 2 padding + 4-byte keysym.
pub const KEY_EVENT_SIZE: usize = 8;
/// PointerEvent: type + button mask + x + y.
pub const POINTER_EVENT_SIZE: usize = 6;
/// ClientCutText fixed prefix: type + 3 padding + 4-byte length.
pub const CLIENT_CUT_TEXT_FIXED_SIZE: usize = 8;

// ── Protocol versions ─────────────────────────────────────────────────────────

/// Negotiated protocol level.
///
/// `RFB 003.005` is a known-incorrect client string and is treated exactly
/// like `RFB 003.003`, so there is no separate variant for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// 3.3 (and the 3.5 alias): the server picks the security type.
    Rfb33,
    /// 3.7: the client selects a security type from a list.
    Rfb37,
    /// 3.8: as 3.7, plus a SecurityResult on every path.
    Rfb38,
}

impl ProtocolVersion {
    /// Maps a 12-byte client version line to a protocol level.
    ///
    /// Returns `None` for anything other than the four recognised lines.
    pub fn from_version_line(line: &[u8]) -> Option<Self> {
        match line {
            b"RFB 003.003\n" | b"RFB 003.005\n" => Some(ProtocolVersion::Rfb33),
            b"RFB 003.007\n" => Some(ProtocolVersion::Rfb37),
            b"RFB 003.008\n" => Some(ProtocolVersion::Rfb38),
            _ => None,
        }
    }

    /// Returns `true` for the legacy level, where the server dictates the
    /// security type instead of offering a list.
    pub fn is_legacy(self) -> bool {
        matches!(self, ProtocolVersion::Rfb33)
    }

    /// Minor version number, for logging.
    pub fn minor(self) -> u8 {
        match self {
            ProtocolVersion::Rfb33 => 3,
            ProtocolVersion::Rfb37 => 7,
            ProtocolVersion::Rfb38 => 8,
        }
    }

    /// Number of bytes the client sends after the security reply: the
    /// selected security type (non-legacy only) followed by the ClientInit
    /// shared flag.
    pub fn client_init_len(self) -> usize {
        if self.is_legacy() {
            1
        } else {
            2
        }
    }
}

// ── Pixel format ──────────────────────────────────────────────────────────────

/// The 16-byte pixel-format block shared by ServerInit and SetPixelFormat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelFormat {
    pub bits_per_pixel: u8,
    pub depth: u8,
    pub big_endian: bool,
    pub true_color: bool,
    pub red_max: u16,
    pub green_max: u16,
    pub blue_max: u16,
    pub red_shift: u8,
    pub green_shift: u8,
    pub blue_shift: u8,
}

impl PixelFormat {
    /// 32-bit little-endian true-colour with red in the low byte.
    pub const RGB888: PixelFormat = PixelFormat {
        bits_per_pixel: 32,
        depth: 24,
        big_endian: false,
        true_color: true,
        red_max: 255,
        green_max: 255,
        blue_max: 255,
        red_shift: 0,
        green_shift: 8,
        blue_shift: 16,
    };

    /// Bytes occupied by one pixel on the wire.
    pub fn bytes_per_pixel(&self) -> usize {
        usize::from(self.bits_per_pixel / 8)
    }

    /// Returns `true` if a client could reasonably request this format.
    pub fn is_valid(&self) -> bool {
        matches!(self.bits_per_pixel, 8 | 16 | 32) && self.depth <= self.bits_per_pixel
    }

    /// Serialises the block, including its three trailing padding bytes.
    pub fn to_bytes(&self) -> [u8; PIXEL_FORMAT_SIZE] {
        let mut b = [0u8; PIXEL_FORMAT_SIZE];
        b[0] = self.bits_per_pixel;
        b[1] = self.depth;
        b[2] = u8::from(self.big_endian);
        b[3] = u8::from(self.true_color);
        b[4..6].copy_from_slice(&self.red_max.to_be_bytes());
        b[6..8].copy_from_slice(&self.green_max.to_be_bytes());
        b[8..10].copy_from_slice(&self.blue_max.to_be_bytes());
        b[10] = self.red_shift;
        b[11] = self.green_shift;
        b[12] = self.blue_shift;
        b
    }

    /// Parses a 16-byte block. Padding bytes are ignored.
    pub fn from_bytes(b: &[u8; PIXEL_FORMAT_SIZE]) -> Self {
        Self {
            bits_per_pixel: b[0],
            depth: b[1],
            big_endian: b[2] != 0,
            true_color: b[3] != 0,
            red_max: u16::from_be_bytes([b[4], b[5]]),
            green_max: u16::from_be_bytes([b[6], b[7]]),
            blue_max: u16::from_be_bytes([b[8], b[9]]),
            red_shift: b[10],
            green_shift: b[11],
            blue_shift: b[12],
        }
    }
}

// ── Client message kinds ──────────────────────────────────────────────────────

/// Client-to-server message kind, selected by the leading opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    SetPixelFormat,
    SetEncodings,
    FramebufferUpdateRequest,
    KeyEvent,
    PointerEvent,
    ClientCutText,
    /// Any opcode this server does not understand.
    Unknown(u8),
}

impl From<u8> for MessageKind {
    fn from(value: u8) -> Self {
        match value {
            0 => MessageKind::SetPixelFormat,
            2 => MessageKind::SetEncodings,
            3 => MessageKind::FramebufferUpdateRequest,
            4 => MessageKind::KeyEvent,
            5 => MessageKind::PointerEvent,
            6 => MessageKind::ClientCutText,
            other => MessageKind::Unknown(other),
        }
    }
}

// ── Encodings ─────────────────────────────────────────────────────────────────

/// Encoding identifiers a client may list in SetEncodings.
///
/// Only [`Encoding::Raw`] is ever produced by this server; the rest are
/// recognised purely so they can be logged by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    Raw,
    CopyRect,
    Rre,
    Hextile,
    Tight,
    Zrle,
    /// Pseudo-encoding: cursor shape updates.
    Cursor,
    /// Pseudo-encoding: desktop resize.
    DesktopSize,
    /// Anything else; ignored.
    Other(i32),
}

impl Encoding {
    /// Wire value of the encoding.
    pub fn id(self) -> i32 {
        match self {
            Encoding::Raw => 0,
            Encoding::CopyRect => 1,
            Encoding::Rre => 2,
            Encoding::Hextile => 5,
            Encoding::Tight => 7,
            Encoding::Zrle => 16,
            Encoding::Cursor => -239,
            Encoding::DesktopSize => -223,
            Encoding::Other(id) => id,
        }
    }
}

impl From<i32> for Encoding {
    fn from(value: i32) -> Self {
        match value {
            0 => Encoding::Raw,
            1 => Encoding::CopyRect,
            2 => Encoding::Rre,
            5 => Encoding::Hextile,
            7 => Encoding::Tight,
            16 => Encoding::Zrle,
            -239 => Encoding::Cursor,
            -223 => Encoding::DesktopSize,
            other => Encoding::Other(other),
        }
    }
}

// ── Client message payloads ───────────────────────────────────────────────────

/// FramebufferUpdateRequest: the client's interest rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateRequest {
    /// `false` asks for the full contents of the rectangle, not just changes.
    pub incremental: bool,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

/// KeyEvent: an X11 keysym going down or up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub down: bool,
    pub keysym: u32,
}

/// PointerEvent: button mask plus absolute position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub button_mask: u8,
    pub x: u16,
    pub y: u16,
}

/// A fully received and validated client-to-server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    SetPixelFormat(PixelFormat),
    SetEncodings(Vec<Encoding>),
    FramebufferUpdateRequest(UpdateRequest),
    KeyEvent(KeyEvent),
    PointerEvent(PointerEvent),
    /// Clipboard text from the client. The content is discarded; only its
    /// length is kept for logging.
    ClientCutText { length: u32 },
}

impl ClientMessage {
    /// The message kind this value was decoded from.
    pub fn kind(&self) -> MessageKind {
        match self {
            ClientMessage::SetPixelFormat(_) => MessageKind::SetPixelFormat,
            ClientMessage::SetEncodings(_) => MessageKind::SetEncodings,
            ClientMessage::FramebufferUpdateRequest(_) => MessageKind::FramebufferUpdateRequest,
            ClientMessage::KeyEvent(_) => MessageKind::KeyEvent,
            ClientMessage::PointerEvent(_) => MessageKind::PointerEvent,
            ClientMessage::ClientCutText { .. } => MessageKind::ClientCutText,
        }
    }
}

// ── Server message payloads ───────────────────────────────────────────────────

/// Header of a FramebufferUpdate carrying a single raw-encoded rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RectangleHeader {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
