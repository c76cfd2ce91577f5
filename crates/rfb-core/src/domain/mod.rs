//! Domain values for the RFB engine.
//!
//! Nothing here performs I/O. The types describe what the server advertises
//! ([`capabilities`]) and how the screen is cut up for change tracking
//! ([`grid`]); the engine owns the state that evolves over a connection.

/// Display mode and the capabilities record sent in ServerInit.
pub mod capabilities;

/// Chunk geometry and the per-chunk checksum cache.
pub mod grid;
