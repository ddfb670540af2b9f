//! Wire protocol types for the conversational session channel
//!
//! This module defines the JSON frame types exchanged with the agent server
//! over the streaming duplex connection.
//!
//! # Protocol Overview
//!
//! 1. Client sends `message` frames carrying user text and a language tag
//! 2. Server streams the agent response as `delta` fragments
//! 3. Server terminates the response cycle with a `done` frame
//! 4. `estimate`, `error` and `ack` frames are advisory and never carry
//!    transcript content

use serde::{Deserialize, Serialize};

/// Language tag used when a `done` frame carries no tag of its own
pub const DEFAULT_REPLY_LANG: &str = "en-US";

/// Frames sent from client to server
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// One finalized user message
    #[serde(rename = "message")]
    Message {
        text: String,
        /// BCP-47-like tag, or `null` to let the server decide
        lang: Option<String>,
    },
}

impl ClientFrame {
    /// Create a message frame from user text and a resolved language tag
    pub fn message(text: impl Into<String>, lang: Option<String>) -> Self {
        Self::Message {
            text: text.into(),
            lang,
        }
    }

    /// Serialize the frame to its wire representation
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Frames received from the server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Incremental fragment of an in-progress agent response
    #[serde(rename = "delta")]
    Delta {
        #[serde(default)]
        text: Option<String>,
    },

    /// Final agent response, terminating the current accumulation cycle
    #[serde(rename = "done")]
    Done {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        lang: Option<String>,
    },

    /// Advisory cost metadata, not part of the conversation transcript
    #[serde(rename = "estimate")]
    Estimate {
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        input_tokens: Option<u64>,
        #[serde(default)]
        estimated_cost_usd: Option<f64>,
    },

    /// Server- or transport-reported failure condition
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        message: Option<String>,
    },

    /// Acknowledgement, no transcript effect
    #[serde(rename = "ack")]
    Ack,

    /// Catch-all for frame types we don't handle
    /// This prevents deserialization failures for unknown types
    #[serde(other)]
    Unknown,
}

/// Decode one inbound frame, dropping anything that can't be interpreted
///
/// Malformed JSON and unknown frame types are logged and swallowed here so
/// they can never corrupt session state downstream.
pub fn decode_frame(raw: &str) -> Option<ServerEvent> {
    match serde_json::from_str::<ServerEvent>(raw) {
        Ok(ServerEvent::Unknown) => {
            log::debug!("Ignoring unknown frame type: {}", truncate(raw, 120));
            None
        }
        Ok(event) => Some(event),
        Err(e) => {
            log::warn!("Dropping malformed frame ({}): {}", e, truncate(raw, 120));
            None
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
