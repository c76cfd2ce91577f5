//! In-memory RGB888 framebuffer.

use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::domain::capabilities::{FramebufferMode, PixelLayout};
use crate::domain::grid::Rect;
use crate::framebuffer::Framebuffer;

const BYTES_PER_PIXEL: usize = 4;

struct Surface {
    width: u16,
    height: u16,
    pixels: Vec<u8>,
}

impl Surface {
    fn blank(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; usize::from(width) * usize::from(height) * BYTES_PER_PIXEL],
        }
    }

    /// Byte range of one row of `rect`, clipped to the surface.
    fn row_span(&self, rect: Rect, row: u16) -> Option<std::ops::Range<usize>> {
        let y = u32::from(rect.y) + u32::from(row);
        if y >= u32::from(self.height) || rect.x >= self.width {
            return None;
        }
        let x_end = (u32::from(rect.x) + u32::from(rect.width)).min(u32::from(self.width));
        let stride = usize::from(self.width) * BYTES_PER_PIXEL;
        let start = y as usize * stride + usize::from(rect.x) * BYTES_PER_PIXEL;
        let end = y as usize * stride + x_end as usize * BYTES_PER_PIXEL;
        Some(start..end)
    }
}

/// A 32-bit RGB888 framebuffer held in process memory.
///
/// Pixels are stored as `[r, g, b, 0]`, matching
/// [`PixelFormat::RGB888`](crate::protocol::messages::PixelFormat::RGB888)
/// on the wire, so copy-out is a plain row copy.
pub struct MemoryFramebuffer {
    surface: RwLock<Surface>,
}

impl MemoryFramebuffer {
    /// Creates a black framebuffer of the given size.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            surface: RwLock::new(Surface::blank(width, height)),
        }
    }

    /// Switches to a new resolution. Contents are cleared to black.
    pub fn set_mode(&self, width: u16, height: u16) {
        debug!("framebuffer mode set to {width}x{height}");
        *self.surface.write().unwrap_or_else(PoisonError::into_inner) = Surface::blank(width, height);
    }

    /// Paints `rect` (clipped to the screen) with one colour, given as
    /// `0x00RRGGBB`.
    pub fn fill_rect(&self, rect: Rect, rgb: u32) {
        let pixel = [(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 0];
        let mut surface = self.surface.write().unwrap_or_else(PoisonError::into_inner);
        for row in 0..rect.height {
            let Some(span) = surface.row_span(rect, row) else {
                break;
            };
            for px in surface.pixels[span].chunks_exact_mut(BYTES_PER_PIXEL) {
                px.copy_from_slice(&pixel);
            }
        }
    }

    /// Reads back one pixel as `0x00RRGGBB`, or `None` outside the screen.
    pub fn pixel(&self, x: u16, y: u16) -> Option<u32> {
        let surface = self.surface.read().unwrap_or_else(PoisonError::into_inner);
        let span = surface.row_span(Rect { x, y, width: 1, height: 1 }, 0)?;
        let px = &surface.pixels[span];
        Some(u32::from(px[0]) << 16 | u32::from(px[1]) << 8 | u32::from(px[2]))
    }
}

impl Framebuffer for MemoryFramebuffer {
    fn current_mode(&self) -> Option<FramebufferMode> {
        let surface = self.surface.read().unwrap_or_else(PoisonError::into_inner);
        Some(FramebufferMode {
            width: surface.width,
            height: surface.height,
            layout: PixelLayout::Rgb888,
        })
    }

    fn checksum_rect(&self, rect: Rect) -> u32 {
        let surface = self.surface.read().unwrap_or_else(PoisonError::into_inner);
        let mut hasher = DefaultHasher::new();
        for row in 0..rect.height {
            match surface.row_span(rect, row) {
                Some(span) => hasher.write(&surface.pixels[span]),
                None => break,
            }
        }
        let h = hasher.finish();
        (h ^ (h >> 32)) as u32
    }

    fn copy_pixels(&self, rect: Rect, out: &mut [u8]) {
        let surface = self.surface.read().unwrap_or_else(PoisonError::into_inner);
        let out_stride = usize::from(rect.width) * BYTES_PER_PIXEL;
        for (row, dst) in (0..rect.height).zip(out.chunks_mut(out_stride.max(1))) {
            let Some(span) = surface.row_span(rect, row) else {
                break;
            };
            let len = span.len().min(dst.len());
            dst[..len].copy_from_slice(&surface.pixels[span.start..span.start + len]);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
