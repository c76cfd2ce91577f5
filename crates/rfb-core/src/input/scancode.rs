//! X11 KeySym to PC scancode (set 1) translation.
//!
//! RFB key events carry X11 KeySyms (X11/keysymdef.h). The console this
//! server feeds expects the make codes a PC/AT keyboard controller would
//! produce in scancode set 1. The break code of a key is its make code with
//! the high bit set; keys added with the enhanced 101-key layout (cursor
//! block, right-hand modifiers) are preceded by an `0xE0` prefix byte.
//!
//! Shifted symbols map to the scancode of the key that produces them; the
//! viewer sends the Shift press as its own event.

/// Prefix byte for enhanced-keyboard scancodes.
pub const EXTENDED_PREFIX: u8 = 0xE0;

/// High bit that turns a make code into a break code.
pub const BREAK_BIT: u8 = 0x80;

/// A set-1 scancode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scancode {
    pub code: u8,
    /// Preceded by [`EXTENDED_PREFIX`] on the wire.
    pub extended: bool,
}

impl Scancode {
    const fn basic(code: u8) -> Self {
        Self {
            code,
            extended: false,
        }
    }

    const fn extended(code: u8) -> Self {
        Self {
            code,
            extended: true,
        }
    }

    /// Bytes emitted for a press (`down`) or a release.
    pub fn bytes(self, down: bool) -> Vec<u8> {
        let code = if down { self.code } else { self.code | BREAK_BIT };
        if self.extended {
            vec![EXTENDED_PREFIX, code]
        } else {
            vec![code]
        }
    }
}

/// Translates an X11 KeySym to a set-1 scancode.
///
/// Returns `None` for keysyms with no key on a US PC keyboard.
pub fn keysym_to_scancode(keysym: u32) -> Option<Scancode> {
    if let Some(code) = latin1_to_make(keysym) {
        return Some(Scancode::basic(code));
    }
    let sc = match keysym {
        0xFF08 => Scancode::basic(0x0E), // XK_BackSpace
        0xFF09 => Scancode::basic(0x0F), // XK_Tab
        0xFF0D => Scancode::basic(0x1C), // XK_Return
        0xFF1B => Scancode::basic(0x01), // XK_Escape

        // Navigation block
        0xFF50 => Scancode::extended(0x47), // XK_Home
        0xFF51 => Scancode::extended(0x4B), // XK_Left
        0xFF52 => Scancode::extended(0x48), // XK_Up
        0xFF53 => Scancode::extended(0x4D), // XK_Right
        0xFF54 => Scancode::extended(0x50), // XK_Down
        0xFF55 => Scancode::extended(0x49), // XK_Page_Up
        0xFF56 => Scancode::extended(0x51), // XK_Page_Down
        0xFF57 => Scancode::extended(0x4F), // XK_End
        0xFF63 => Scancode::extended(0x52), // XK_Insert
        0xFFFF => Scancode::extended(0x53), // XK_Delete

        // F1-F10 are contiguous in both tables; F11/F12 were appended later.
        k @ 0xFFBE..=0xFFC7 => Scancode::basic(0x3B + (k - 0xFFBE) as u8),
        0xFFC8 => Scancode::basic(0x57), // XK_F11
        0xFFC9 => Scancode::basic(0x58), // XK_F12

        // Modifiers
        0xFFE1 => Scancode::basic(0x2A),    // XK_Shift_L
        0xFFE2 => Scancode::basic(0x36),    // XK_Shift_R
        0xFFE3 => Scancode::basic(0x1D),    // XK_Control_L
        0xFFE4 => Scancode::extended(0x1D), // XK_Control_R
        0xFFE5 => Scancode::basic(0x3A),    // XK_Caps_Lock
        0xFFE9 => Scancode::basic(0x38),    // XK_Alt_L
        0xFFEA => Scancode::extended(0x38), // XK_Alt_R

        _ => return None,
    };
    Some(sc)
}

/// Make code for printable Latin-1 keysyms, which equal their ASCII value.
fn latin1_to_make(keysym: u32) -> Option<u8> {
    let ch = char::from_u32(keysym).filter(|c| c.is_ascii())?;
    let code = match ch.to_ascii_lowercase() {
        ' ' => 0x39,

        // Top row, plain and shifted
        '1' | '!' => 0x02,
        '2' | '@' => 0x03,
        '3' | '#' => 0x04,
        '4' | '$' => 0x05,
        '5' | '%' => 0x06,
        '6' | '^' => 0x07,
        '7' | '&' => 0x08,
        '8' | '*' => 0x09,
        '9' | '(' => 0x0A,
        '0' | ')' => 0x0B,
        '-' | '_' => 0x0C,
        '=' | '+' => 0x0D,

        'q' => 0x10,
        'w' => 0x11,
        'e' => 0x12,
        'r' => 0x13,
        't' => 0x14,
        'y' => 0x15,
        'u' => 0x16,
        'i' => 0x17,
        'o' => 0x18,
        'p' => 0x19,
        '[' | '{' => 0x1A,
        ']' | '}' => 0x1B,

        'a' => 0x1E,
        's' => 0x1F,
        'd' => 0x20,
        'f' => 0x21,
        'g' => 0x22,
        'h' => 0x23,
        'j' => 0x24,
        'k' => 0x25,
        'l' => 0x26,
        ';' | ':' => 0x27,
        '\'' | '"' => 0x28,
        '`' | '~' => 0x29,
        '\\' | '|' => 0x2B,

        'z' => 0x2C,
        'x' => 0x2D,
        'c' => 0x2E,
        'v' => 0x2F,
        'b' => 0x30,
        'n' => 0x31,
        'm' => 0x32,
        ',' | '<' => 0x33,
        '.' | '>' => 0x34,
        '/' | '?' => 0x35,

        _ => return None,
    };
    Some(code)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
