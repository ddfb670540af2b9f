//! voxlink: a voice-enabled conversational session client
//!
//! The crate implements the realtime session coordinator for a chat client
//! that exchanges typed or spoken messages with a remote agent over a
//! reconnecting streaming connection, accumulates incremental responses, and
//! arbitrates the voice channel (capture vs. playback, language detection,
//! remote-first synthesis with local fallback).
//!
//! Presentation is not this crate's concern: a host renders
//! [`session::SessionSnapshot`] values and feeds intents through
//! [`session::SessionHandle`]. Platform speech engines are injected through
//! the capability traits in [`speech::capability`].

pub mod config;
pub mod lang;
pub mod metrics;
pub mod session;
pub mod speech;
pub mod transport;

pub use config::{load_settings, save_settings, EndpointPolicy, SessionConfig};
pub use lang::LangPreference;
pub use session::{
    Capabilities, Connectivity, Role, Session, SessionCommand, SessionHandle, SessionSnapshot,
    Turn,
};
