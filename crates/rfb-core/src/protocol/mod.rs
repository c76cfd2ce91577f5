//! RFB wire protocol: message types, the binary codec and the handshake.

pub mod codec;
pub mod handshake;
pub mod messages;

pub use codec::{decode_client_message, ProtocolError};
pub use handshake::{HandshakeStep, Negotiator, Phase};
pub use messages::*;
