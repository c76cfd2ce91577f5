//! Framebuffer mode and the server capabilities advertised in ServerInit.
//!
//! [`ServerCapabilities`] is an immutable value. When the display mode
//! changes, a fresh value is derived with [`ServerCapabilities::refreshed`]
//! and handed to connections accepted afterwards; existing connections keep
//! the `Arc` they were created with.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::protocol::codec::encode_server_init;
use crate::protocol::messages::PixelFormat;

/// Pixel memory layout reported by the framebuffer collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelLayout {
    /// 32 bits per pixel, red in the lowest byte, top byte unused.
    Rgb888,
    /// A layout this server cannot describe; carries the driver's format code.
    Unsupported(u32),
}

impl PixelLayout {
    /// The wire pixel format for this layout, if it has one.
    pub fn pixel_format(self) -> Option<PixelFormat> {
        match self {
            PixelLayout::Rgb888 => Some(PixelFormat::RGB888),
            PixelLayout::Unsupported(_) => None,
        }
    }
}

/// Current display mode of the framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramebufferMode {
    pub width: u16,
    pub height: u16,
    pub layout: PixelLayout,
}

/// Everything the server tells a client during ServerInit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Desktop name shown in the viewer's title bar.
    pub name: String,
    pub width: u16,
    pub height: u16,
    pub pixel_format: PixelFormat,
}

impl ServerCapabilities {
    /// Creates capabilities with only a name; dimensions and pixel format are
    /// filled in by the first [`refreshed`](Self::refreshed) call.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            width: 0,
            height: 0,
            pixel_format: PixelFormat::default(),
        }
    }

    /// Derives capabilities for the framebuffer's current mode.
    ///
    /// With no framebuffer the value is returned unchanged. An unsupported
    /// layout updates the dimensions but keeps the previous pixel format.
    pub fn refreshed(&self, mode: Option<&FramebufferMode>) -> Self {
        let mut next = self.clone();
        let Some(mode) = mode else {
            warn!("no framebuffer; capabilities unchanged");
            return next;
        };

        next.width = mode.width;
        next.height = mode.height;
        match mode.layout.pixel_format() {
            Some(format) => {
                debug!("capabilities set for {}x{} {:?}", mode.width, mode.height, mode.layout);
                next.pixel_format = format;
            }
            None => warn!("unknown framebuffer layout {:?}", mode.layout),
        }
        next
    }

    /// Returns `true` once a usable pixel format has been established.
    pub fn has_pixel_format(&self) -> bool {
        self.pixel_format.bytes_per_pixel() > 0
    }

    /// Encodes the ServerInit record.
    pub fn encode(&self) -> Vec<u8> {
        encode_server_init(self.width, self.height, &self.pixel_format, &self.name)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(width: u16, height: u16, layout: PixelLayout) -> FramebufferMode {
        FramebufferMode {
            width,
            height,
            layout,
        }
    }

    #[test]
    fn test_new_capabilities_have_no_pixel_format() {
        let caps = ServerCapabilities::new("desk");
        assert!(!caps.has_pixel_format());
        assert_eq!(caps.name, "desk");
    }

    #[test]
    fn test_refreshed_rgb888_sets_dimensions_and_format() {
        // Arrange
        let caps = ServerCapabilities::new("desk");

        // Act
        let next = caps.refreshed(Some(&mode(1024, 768, PixelLayout::Rgb888)));

        // Assert
        assert_eq!((next.width, next.height), (1024, 768));
        assert_eq!(next.pixel_format, PixelFormat::RGB888);
        assert!(next.has_pixel_format());
        // The original value is untouched.
        assert_eq!(caps.width, 0);
    }

    #[test]
    fn test_refreshed_unsupported_layout_keeps_previous_format() {
        let caps = ServerCapabilities::new("desk").refreshed(Some(&mode(800, 600, PixelLayout::Rgb888)));

        let next = caps.refreshed(Some(&mode(320, 200, PixelLayout::Unsupported(7))));

        assert_eq!((next.width, next.height), (320, 200));
        assert_eq!(next.pixel_format, PixelFormat::RGB888);
    }

    #[test]
    fn test_refreshed_without_framebuffer_is_unchanged() {
        let caps = ServerCapabilities::new("desk").refreshed(Some(&mode(800, 600, PixelLayout::Rgb888)));
        assert_eq!(caps.refreshed(None), caps);
    }

    #[test]
    fn test_encode_carries_name() {
        let caps = ServerCapabilities::new("console").refreshed(Some(&mode(8, 8, PixelLayout::Rgb888)));
        let bytes = caps.encode();
        assert_eq!(&bytes[20..24], &7u32.to_be_bytes());
        assert_eq!(&bytes[24..], b"console");
    }
}
