//! Keeps the demo display changing so viewers have something to receive.
//!
//! A vertical band sweeps across a dark background; each step repaints only
//! the column the band leaves and the column it enters, so most chunks stay
//! unchanged between passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rfb_core::{Framebuffer, MemoryFramebuffer, Rect};
use tracing::debug;

const BACKGROUND: u32 = 0x0010_1820;
const BAND: u32 = 0x00E0_A030;
const BAND_WIDTH: u16 = 16;

/// Position of the sweeping band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sweep {
    x: u16,
}

impl Sweep {
    /// Left edge of the band.
    pub fn position(&self) -> u16 {
        self.x
    }

    /// Paints the next frame onto `fb` and advances the band.
    pub fn step(&mut self, fb: &MemoryFramebuffer) {
        let Some(mode) = fb.current_mode() else {
            return;
        };
        if mode.width == 0 || mode.height == 0 {
            return;
        }
        let width = BAND_WIDTH.min(mode.width);
        let next = if self.x.saturating_add(width) >= mode.width {
            0
        } else {
            self.x + width
        };

        fb.fill_rect(column(self.x, width, mode.height), BACKGROUND);
        fb.fill_rect(column(next, width, mode.height), BAND);
        self.x = next;
    }
}

fn column(x: u16, width: u16, height: u16) -> Rect {
    Rect {
        x,
        y: 0,
        width,
        height,
    }
}

/// Paints the background, then steps the sweep every `interval` until
/// `running` is cleared.
pub async fn run_animation(fb: Arc<MemoryFramebuffer>, interval: Duration, running: Arc<AtomicBool>) {
    if let Some(mode) = fb.current_mode() {
        fb.fill_rect(
            Rect {
                x: 0,
                y: 0,
                width: mode.width,
                height: mode.height,
            },
            BACKGROUND,
        );
    }

    let mut sweep = Sweep::default();
    let mut ticker = tokio::time::interval(interval);
    while running.load(Ordering::SeqCst) {
        ticker.tick().await;
        sweep.step(&fb);
    }
    debug!("display animation stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
