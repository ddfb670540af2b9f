//! Speech output orchestrator
//!
//! Renders finalized agent text as audio with exactly one active stream at a
//! time. A remote synthesis service is preferred; any failure there (network,
//! non-success status, empty payload, playback error) falls back to the local
//! [`Synthesizer`] capability. Each request owns a generation id and a
//! cancellation token; acquiring a new generation always releases the
//! previous one first.
//!
//! The orchestrator is the sole owner of the speaking flag: it is true for
//! the entire interval between a request and its final resolution, and false
//! at all other times.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use reqwest::Client;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::capability::{AudioPlayer, Synthesizer, Voice};
use super::SpeechError;
use crate::lang::primary_subtag;

/// Request timeout for the remote synthesis endpoint
const SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(30);

/// Voice-tag prefixes tried in order before settling for the first voice
const VOICE_PREFERENCE: [&str; 2] = ["fa", "ar"];

/// Shared HTTP client for reuse across requests (avoids TLS handshake overhead)
static HTTP_CLIENT: OnceLock<Client> = OnceLock::new();

fn http_client() -> &'static Client {
    HTTP_CLIENT.get_or_init(|| {
        Client::builder()
            .timeout(SYNTHESIS_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// Events emitted toward the session coordinator
#[derive(Debug, Clone)]
pub enum OutputEvent {
    /// The generation resolved: success, fallback success, or total failure
    Finished { id: Uuid },
}

struct ActiveOutput {
    id: Uuid,
    cancel: CancellationToken,
}

/// Orchestrates the single audio-output channel
pub struct SpeechOutput {
    /// Base URL of the remote synthesis service, e.g. `http://localhost:8000`
    synthesis_base: String,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    player: Option<Arc<dyn AudioPlayer>>,
    events: mpsc::Sender<OutputEvent>,
    current: Option<ActiveOutput>,
}

impl SpeechOutput {
    pub fn new(
        synthesis_base: String,
        synthesizer: Option<Arc<dyn Synthesizer>>,
        player: Option<Arc<dyn AudioPlayer>>,
        events: mpsc::Sender<OutputEvent>,
    ) -> Self {
        Self {
            synthesis_base,
            synthesizer,
            player,
            events,
            current: None,
        }
    }

    /// Render `text` as audio, superseding any output already in flight
    pub fn speak(&mut self, text: String, lang: String) {
        self.cancel();

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        self.current = Some(ActiveOutput {
            id,
            cancel: cancel.clone(),
        });

        log::info!(
            "Speech output requested ({}, lang {}, {} chars)",
            id,
            lang,
            text.len()
        );

        let base = self.synthesis_base.clone();
        let synthesizer = self.synthesizer.clone();
        let player = self.player.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::debug!("Speech output cancelled ({})", id);
                }
                _ = run_chain(&base, synthesizer, player, &text, &lang) => {}
            }
            let _ = events.send(OutputEvent::Finished { id }).await;
        });
    }

    /// Release the audio channel, cancelling any in-flight output
    pub fn cancel(&mut self) {
        if let Some(active) = self.current.take() {
            log::debug!("Cancelling speech output ({})", active.id);
            active.cancel.cancel();
            if let Some(player) = &self.player {
                player.stop();
            }
            if let Some(synthesizer) = &self.synthesizer {
                synthesizer.cancel();
            }
        }
    }

    /// Whether audio is being produced right now
    pub fn is_speaking(&self) -> bool {
        self.current.is_some()
    }

    /// Fold a generation's resolution; returns false for stale generations
    pub fn acknowledge_finished(&mut self, id: Uuid) -> bool {
        match &self.current {
            Some(active) if active.id == id => {
                self.current = None;
                log::info!("Speech output finished ({})", id);
                true
            }
            _ => {
                log::debug!("Stale speech-output finish ignored ({})", id);
                false
            }
        }
    }
}

/// Remote-first synthesis chain for one generation
async fn run_chain(
    base: &str,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    player: Option<Arc<dyn AudioPlayer>>,
    text: &str,
    lang: &str,
) {
    if let Some(player) = player {
        match remote_synthesis(base, text, lang).await {
            Ok(audio) => match player.play(audio).await {
                Ok(()) => return,
                Err(e) => log::warn!("Remote audio playback failed, falling back: {}", e),
            },
            Err(e) => log::info!("Remote synthesis unavailable, falling back: {}", e),
        }
    } else {
        // Without a playback sink a remote payload could never be heard
        log::debug!("No audio player installed; skipping remote synthesis");
    }

    local_fallback(synthesizer, text, lang).await;
}

/// Fetch synthesized audio from the remote service
///
/// Success requires a 2xx status and a non-empty body; anything else is a
/// fallback trigger, never a user-facing error.
async fn remote_synthesis(base: &str, text: &str, lang: &str) -> Result<Vec<u8>, SpeechError> {
    let url = format!("{}/tts", base);
    let response = http_client()
        .get(&url)
        .query(&[("text", text), ("lang", primary_subtag(lang))])
        .send()
        .await
        .map_err(|e| SpeechError::SynthesisFailed(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SpeechError::SynthesisFailed(format!(
            "synthesis endpoint returned {}",
            status
        )));
    }

    let audio = response
        .bytes()
        .await
        .map_err(|e| SpeechError::SynthesisFailed(e.to_string()))?;

    if audio.is_empty() {
        return Err(SpeechError::SynthesisFailed(
            "empty audio payload".to_string(),
        ));
    }

    log::debug!("Remote synthesis returned {} bytes", audio.len());
    Ok(audio.to_vec())
}

/// On-device synthesis of the same text, invoked exactly once per failed
/// remote attempt
async fn local_fallback(synthesizer: Option<Arc<dyn Synthesizer>>, text: &str, lang: &str) {
    let Some(synthesizer) = synthesizer else {
        log::warn!("No local synthesizer installed; dropping speech output");
        return;
    };

    // Voice catalogs can populate lazily; voices() resolves once they have
    let voices = synthesizer.voices().await;
    let voice = select_voice(&voices);
    match &voice {
        Some(v) => log::debug!("Selected voice {} ({})", v.name, v.lang),
        None => log::debug!("No installed voices; letting the engine choose"),
    }

    if let Err(e) = synthesizer.speak(text, lang, voice.as_ref()).await {
        log::warn!("Local synthesis failed: {}", e);
    }
}

/// Best available voice: Persian prefix, then Arabic, then the first one
fn select_voice(voices: &[Voice]) -> Option<Voice> {
    for prefix in VOICE_PREFERENCE {
        if let Some(voice) = voices.iter().find(|v| v.lang.starts_with(prefix)) {
            return Some(voice.clone());
        }
    }
    voices.first().cloned()
}
