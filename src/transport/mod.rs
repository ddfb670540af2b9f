//! Streaming transport for the conversational session
//!
//! This module owns the duplex connection to the agent server and the wire
//! protocol spoken over it.
//!
//! # Architecture
//!
//! ```text
//! Session Coordinator ──commands──▶ Connector task ──WebSocket──▶ server
//!          ▲                            │
//!          └──── TransportEvent ────────┘
//!                (Opened / Frame / Closed / Error)
//! ```
//!
//! Inbound frames are delivered raw and in arrival order; decoding happens in
//! [`protocol::decode_frame`] so a malformed frame can be dropped without
//! touching session state.

mod accumulator;
mod connector;
pub mod protocol;

pub use accumulator::ResponseAccumulator;
pub use connector::{Connector, ReconnectPolicy, TransportEvent};
pub use protocol::{decode_frame, ClientFrame, ServerEvent, DEFAULT_REPLY_LANG};

/// Errors reported by the transport layer
#[derive(Debug, Clone)]
pub enum TransportError {
    /// A send or connect was attempted while the channel is not open
    NotConnected,
    /// The WebSocket handshake failed or timed out
    ConnectFailed(String),
    /// An established connection refused an outbound frame
    SendFailed(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::NotConnected => write!(f, "Not connected to server"),
            TransportError::ConnectFailed(e) => write!(f, "Failed to connect: {}", e),
            TransportError::SendFailed(e) => write!(f, "Failed to send message: {}", e),
        }
    }
}

impl std::error::Error for TransportError {}
