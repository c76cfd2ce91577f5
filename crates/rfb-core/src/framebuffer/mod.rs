//! Framebuffer collaborator.
//!
//! The engine never owns screen memory. It asks a [`Framebuffer`] for the
//! current mode, for a checksum of a rectangle, and for a copy of the
//! rectangle's pixels in the advertised pixel format.
//!
//! [`MemoryFramebuffer`] is a linear RGB888 buffer used by the server binary
//! and by tests. Other implementations (a real display driver, a capture
//! device) plug in behind the same trait.

pub mod memory;

pub use memory::MemoryFramebuffer;

use crate::domain::capabilities::FramebufferMode;
use crate::domain::grid::Rect;

/// Read interface to the screen being served.
///
/// Implementations are shared between connections behind an `Arc`, so every
/// method takes `&self`.
pub trait Framebuffer: Send + Sync {
    /// Current display mode, or `None` if no display is attached.
    fn current_mode(&self) -> Option<FramebufferMode>;

    /// A checksum of the pixels inside `rect`.
    ///
    /// Equal contents must give equal checksums. Different contents should
    /// give different checksums; a collision only delays an update.
    fn checksum_rect(&self, rect: Rect) -> u32;

    /// Copies the pixels of `rect` row by row into `out`.
    ///
    /// `out` holds exactly `rect.area() * bytes_per_pixel` bytes. Pixels that
    /// fall outside the current screen are left untouched.
    fn copy_pixels(&self, rect: Rect, out: &mut [u8]);
}
