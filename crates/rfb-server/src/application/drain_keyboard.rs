//! Consumes scancodes produced by viewer key events.
//!
//! The demo server has no real keyboard controller behind the queue, so the
//! drain task stands in for one: it pops bytes at a fixed rate and logs them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rfb_core::ScancodeQueue;
use tracing::{debug, trace};

/// Pops every queued byte, returning how many were taken.
pub fn drain_once(queue: &ScancodeQueue) -> usize {
    let mut taken = 0;
    while let Some(byte) = queue.pop() {
        trace!("scancode {byte:#04x}");
        taken += 1;
    }
    taken
}

/// Drains `queue` every `interval` until `running` is cleared.
pub async fn run_drain(queue: Arc<ScancodeQueue>, interval: Duration, running: Arc<AtomicBool>) {
    let mut ticker = tokio::time::interval(interval);
    let mut total = 0usize;
    while running.load(Ordering::SeqCst) {
        ticker.tick().await;
        total += drain_once(&queue);
    }
    debug!("keyboard drain stopped after {total} scancodes");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
