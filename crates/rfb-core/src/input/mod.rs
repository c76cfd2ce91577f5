//! Keyboard input collaborator.
//!
//! KeyEvent messages are forwarded to a [`KeyInjector`]. The shipped
//! implementation, [`ScancodeQueue`], turns keysyms into PC scancodes and
//! buffers them for whatever drains the console's keyboard port.
//!
//! Injection failures never end a connection: the dispatcher logs them and
//! moves on to the next message.

pub mod queue;
pub mod scancode;

pub use queue::ScancodeQueue;
pub use scancode::{keysym_to_scancode, Scancode};

use thiserror::Error;

/// Errors from key injection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InjectError {
    /// The keysym has no key on the target keyboard.
    #[error("no scancode for keysym {0:#06x}")]
    UnmappedKeysym(u32),

    /// The injection queue has no room for the key's bytes.
    #[error("key injection queue is full")]
    QueueFull,
}

/// Receives key presses and releases from connected viewers.
///
/// Shared between connections behind an `Arc`, so the method takes `&self`.
#[cfg_attr(test, mockall::automock)]
pub trait KeyInjector: Send + Sync {
    /// Injects one key transition.
    ///
    /// # Errors
    ///
    /// See [`InjectError`].
    fn inject_key(&self, keysym: u32, down: bool) -> Result<(), InjectError>;
}
