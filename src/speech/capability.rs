//! Capability interfaces for platform speech engines
//!
//! Speech-to-text, text-to-speech and audio playback are environment-provided
//! services. They are consumed through these traits so a headless host (or a
//! test) can substitute scripted doubles; absence of a capability is modeled
//! as `None` at session construction, never probed for at call time.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::SpeechError;

/// One installed synthesis voice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    /// BCP-47-like tag, e.g. `fa-IR`
    pub lang: String,
}

/// Results flowing out of an active recognition session
#[derive(Debug, Clone)]
pub enum RecognitionEvent {
    /// One recognized fragment; interim fragments may be revised later,
    /// final ones are stable
    Fragment { text: String, is_final: bool },
    /// The engine stopped, naturally or via `stop()`
    Ended,
    /// The engine stopped with an error
    Failed(String),
}

/// Speech-to-text engine: single-shot capture with streamed results
pub trait Recognizer: Send + Sync {
    /// Begin one capture in `lang`, delivering results over `results`
    ///
    /// The engine signals termination with [`RecognitionEvent::Ended`] or
    /// [`RecognitionEvent::Failed`]; dropping the sender counts as an end.
    fn start(
        &self,
        lang: &str,
        results: mpsc::Sender<RecognitionEvent>,
    ) -> Result<(), SpeechError>;

    /// Ask the engine to stop the active capture; no-op when idle
    fn stop(&self);
}

/// Text-to-speech engine local to the host
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// The installed voice catalog
    ///
    /// Resolves once the catalog is populated; engines that load voices
    /// lazily defer completion rather than return an empty list.
    async fn voices(&self) -> Vec<Voice>;

    /// Synthesize and play `text`, resolving when playback finishes
    async fn speak(
        &self,
        text: &str,
        lang: &str,
        voice: Option<&Voice>,
    ) -> Result<(), SpeechError>;

    /// Cancel any in-flight synthesis
    fn cancel(&self);
}

/// Playback sink for remotely synthesized audio bytes
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Play one audio payload to completion
    ///
    /// Resolves `Ok` on natural completion, `Err` on a playback failure.
    async fn play(&self, audio: Vec<u8>) -> Result<(), SpeechError>;

    /// Stop the current playback, if any
    fn stop(&self);
}
