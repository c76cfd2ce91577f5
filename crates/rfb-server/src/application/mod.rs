//! Application layer: background tasks that give the demo server something
//! to serve and somewhere to send input.
//!
//! # Sub-modules
//!
//! - **`animate_display`** – Repaints part of the in-memory framebuffer on a
//!   timer so connected viewers receive incremental updates.
//!
//! - **`drain_keyboard`** – Empties the scancode queue that viewer key events
//!   fill, standing in for a keyboard controller.
//!
//! Neither task touches sockets; both stop when the shared `running` flag is
//! cleared.

pub mod animate_display;
pub mod drain_keyboard;
