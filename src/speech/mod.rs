//! Voice I/O: capture and synthesized output
//!
//! The platform's speech engines are consumed through the capability traits
//! in [`capability`]; nothing in this module talks to a device directly. The
//! two adapters own the two halves of the audio channel:
//!
//! - [`capture::CaptureAdapter`]: single-shot speech-to-text capture, sole
//!   owner of the `capturing` flag
//! - [`output::SpeechOutput`]: remote-first synthesis with local fallback,
//!   sole owner of the `speaking` flag

pub mod capability;
pub mod capture;
pub mod output;

pub use capability::{AudioPlayer, RecognitionEvent, Recognizer, Synthesizer, Voice};
pub use capture::{CaptureAdapter, CaptureEvent};
pub use output::{OutputEvent, SpeechOutput};

/// Errors reported by the voice I/O layer
#[derive(Debug, Clone)]
pub enum SpeechError {
    /// The required capability is absent in this environment
    Unsupported,
    /// The recognizer failed mid-capture
    CaptureFailed(String),
    /// Remote or local synthesis failed to produce audio
    SynthesisFailed(String),
    /// Audio was produced but could not be played
    PlaybackFailed(String),
}

impl std::fmt::Display for SpeechError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeechError::Unsupported => {
                write!(f, "Speech capability is not supported in this environment")
            }
            SpeechError::CaptureFailed(e) => write!(f, "Speech capture failed: {}", e),
            SpeechError::SynthesisFailed(e) => write!(f, "Speech synthesis failed: {}", e),
            SpeechError::PlaybackFailed(e) => write!(f, "Audio playback failed: {}", e),
        }
    }
}

impl std::error::Error for SpeechError {}
