//! Speech capture adapter
//!
//! Wraps a [`Recognizer`] capability behind a single-shot capture cycle:
//! `Idle → Capturing → Idle`. Interim fragments are discarded, final
//! fragments are concatenated, and a non-empty concatenation is emitted
//! exactly once as a completed utterance when the engine terminates, for any
//! reason. The adapter is the sole owner of the capturing flag.

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use super::capability::{RecognitionEvent, Recognizer};
use super::SpeechError;
use crate::lang::LangPreference;

/// Depth of the per-capture result channel
const RESULT_QUEUE_DEPTH: usize = 32;

/// Events emitted by the adapter toward the session coordinator
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// One completed utterance, emitted at most once per capture cycle
    Utterance { id: Uuid, text: String },
    /// The recognizer reported an error; the cycle produced no transcript
    Failed { id: Uuid, error: String },
    /// The capture cycle is over, whatever ended it
    Ended { id: Uuid },
}

/// Single-shot capture over a speech-to-text capability
pub struct CaptureAdapter {
    recognizer: Option<Arc<dyn Recognizer>>,
    /// Tag handed to the engine when the session preference is `auto`
    default_capture_lang: String,
    events: mpsc::Sender<CaptureEvent>,
    active: Option<Uuid>,
}

impl CaptureAdapter {
    /// Create an adapter over an optional recognizer capability
    pub fn new(
        recognizer: Option<Arc<dyn Recognizer>>,
        default_capture_lang: String,
        events: mpsc::Sender<CaptureEvent>,
    ) -> Self {
        Self {
            recognizer,
            default_capture_lang,
            events,
            active: None,
        }
    }

    /// Begin a capture cycle
    ///
    /// No-op while already capturing; `Err(Unsupported)` when no recognizer
    /// capability is installed.
    pub fn start(&mut self, preference: &LangPreference) -> Result<(), SpeechError> {
        if self.active.is_some() {
            log::debug!("Capture already in progress; start ignored");
            return Ok(());
        }

        let Some(recognizer) = self.recognizer.as_ref() else {
            return Err(SpeechError::Unsupported);
        };

        // The engine wants a concrete tag up front; `auto` defers final
        // classification to the completed utterance, not to partial results.
        let lang = match preference {
            LangPreference::Auto => self.default_capture_lang.clone(),
            LangPreference::Fixed(tag) => tag.clone(),
        };

        let (result_tx, result_rx) = mpsc::channel(RESULT_QUEUE_DEPTH);
        recognizer.start(&lang, result_tx)?;

        let id = Uuid::new_v4();
        self.active = Some(id);
        log::info!("Capture started ({}, lang {})", id, lang);

        tokio::spawn(relay_results(id, result_rx, self.events.clone()));
        Ok(())
    }

    /// Ask the engine to stop the active capture; no-op while idle
    pub fn stop(&self) {
        match (&self.active, &self.recognizer) {
            (Some(id), Some(recognizer)) => {
                log::info!("Capture stop requested ({})", id);
                recognizer.stop();
            }
            _ => log::debug!("Capture stop while idle; ignored"),
        }
    }

    /// Whether a capture cycle is open
    pub fn is_capturing(&self) -> bool {
        self.active.is_some()
    }

    /// Whether `id` belongs to the open capture cycle
    pub fn is_current(&self, id: Uuid) -> bool {
        self.active == Some(id)
    }

    /// Fold a cycle end; returns false for stale ids
    pub fn acknowledge_end(&mut self, id: Uuid) -> bool {
        if self.active == Some(id) {
            self.active = None;
            log::info!("Capture ended ({})", id);
            true
        } else {
            log::debug!("Stale capture end ignored ({})", id);
            false
        }
    }
}

/// Drain engine results for one cycle, emitting the aggregate at the end
async fn relay_results(
    id: Uuid,
    mut results: mpsc::Receiver<RecognitionEvent>,
    events: mpsc::Sender<CaptureEvent>,
) {
    let mut finals = String::new();
    let mut failed = false;

    while let Some(event) = results.recv().await {
        match event {
            RecognitionEvent::Fragment { text, is_final: true } => finals.push_str(&text),
            RecognitionEvent::Fragment { .. } => {}
            RecognitionEvent::Ended => break,
            RecognitionEvent::Failed(error) => {
                failed = true;
                let _ = events.send(CaptureEvent::Failed { id, error }).await;
                break;
            }
        }
    }

    let utterance = finals.trim();
    if !failed && !utterance.is_empty() {
        let _ = events
            .send(CaptureEvent::Utterance {
                id,
                text: utterance.to_string(),
            })
            .await;
    }

    let _ = events.send(CaptureEvent::Ended { id }).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Recognizer double that replays a fixed result script
    struct ScriptedRecognizer {
        script: Vec<RecognitionEvent>,
        started_lang: Mutex<Option<String>>,
    }

    impl ScriptedRecognizer {
        fn new(script: Vec<RecognitionEvent>) -> Arc<Self> {
            Arc::new(Self {
                script,
                started_lang: Mutex::new(None),
            })
        }
    }

    impl Recognizer for ScriptedRecognizer {
        fn start(
            &self,
            lang: &str,
            results: mpsc::Sender<RecognitionEvent>,
        ) -> Result<(), SpeechError> {
            *self.started_lang.lock().unwrap() = Some(lang.to_string());
            let script = self.script.clone();
            tokio::spawn(async move {
                for event in script {
                    if results.send(event).await.is_err() {
                        break;
                    }
                }
            });
            Ok(())
        }

        fn stop(&self) {}
    }

    fn fragment(text: &str, is_final: bool) -> RecognitionEvent {
        RecognitionEvent::Fragment {
            text: text.to_string(),
            is_final,
        }
    }

    #[tokio::test]
    async fn test_start_without_recognizer_is_unsupported() {
        let (tx, _rx) = mpsc::channel(8);
        let mut adapter = CaptureAdapter::new(None, "fa-IR".to_string(), tx);
        assert!(matches!(
            adapter.start(&LangPreference::Auto),
            Err(SpeechError::Unsupported)
        ));
        assert!(!adapter.is_capturing());
    }

    #[tokio::test]
    async fn test_final_fragments_emit_one_utterance() {
        let recognizer = ScriptedRecognizer::new(vec![
            fragment("hel", false),
            fragment("hello ", true),
            fragment("interim noise", false),
            fragment("world", true),
            RecognitionEvent::Ended,
        ]);
        let (tx, mut rx) = mpsc::channel(8);
        let mut adapter = CaptureAdapter::new(Some(recognizer), "fa-IR".to_string(), tx);

        adapter.start(&LangPreference::Auto).unwrap();
        assert!(adapter.is_capturing());

        match rx.recv().await.unwrap() {
            CaptureEvent::Utterance { id, text } => {
                assert!(adapter.is_current(id));
                assert_eq!(text, "hello world");
            }
            other => panic!("Expected Utterance, got {:?}", other),
        }
        match rx.recv().await.unwrap() {
            CaptureEvent::Ended { id } => assert!(adapter.acknowledge_end(id)),
            other => panic!("Expected Ended, got {:?}", other),
        }
        assert!(!adapter.is_capturing());
    }

    #[tokio::test]
    async fn test_interim_only_capture_emits_no_utterance() {
        let recognizer =
            ScriptedRecognizer::new(vec![fragment("partial", false), RecognitionEvent::Ended]);
        let (tx, mut rx) = mpsc::channel(8);
        let mut adapter = CaptureAdapter::new(Some(recognizer), "fa-IR".to_string(), tx);

        adapter.start(&LangPreference::Auto).unwrap();

        match rx.recv().await.unwrap() {
            CaptureEvent::Ended { .. } => {}
            other => panic!("Expected Ended only, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_produces_no_transcript() {
        let recognizer = ScriptedRecognizer::new(vec![
            fragment("doomed", true),
            RecognitionEvent::Failed("audio-capture".to_string()),
        ]);
        let (tx, mut rx) = mpsc::channel(8);
        let mut adapter = CaptureAdapter::new(Some(recognizer), "fa-IR".to_string(), tx);

        adapter.start(&LangPreference::Auto).unwrap();

        match rx.recv().await.unwrap() {
            CaptureEvent::Failed { error, .. } => assert_eq!(error, "audio-capture"),
            other => panic!("Expected Failed, got {:?}", other),
        }
        match rx.recv().await.unwrap() {
            CaptureEvent::Ended { id } => {
                adapter.acknowledge_end(id);
            }
            other => panic!("Expected Ended, got {:?}", other),
        }
        assert!(!adapter.is_capturing());
    }

    #[tokio::test]
    async fn test_auto_preference_uses_default_capture_lang() {
        let recognizer = ScriptedRecognizer::new(vec![RecognitionEvent::Ended]);
        let (tx, _rx) = mpsc::channel(8);
        let mut adapter =
            CaptureAdapter::new(Some(recognizer.clone()), "fa-IR".to_string(), tx);

        adapter.start(&LangPreference::Auto).unwrap();
        assert_eq!(
            recognizer.started_lang.lock().unwrap().as_deref(),
            Some("fa-IR")
        );
    }

    #[tokio::test]
    async fn test_fixed_preference_routes_to_engine() {
        let recognizer = ScriptedRecognizer::new(vec![RecognitionEvent::Ended]);
        let (tx, _rx) = mpsc::channel(8);
        let mut adapter =
            CaptureAdapter::new(Some(recognizer.clone()), "fa-IR".to_string(), tx);

        adapter
            .start(&LangPreference::Fixed("en-US".to_string()))
            .unwrap();
        assert_eq!(
            recognizer.started_lang.lock().unwrap().as_deref(),
            Some("en-US")
        );
    }

    #[tokio::test]
    async fn test_double_start_is_a_no_op() {
        let recognizer = ScriptedRecognizer::new(vec![]);
        let (tx, _rx) = mpsc::channel(8);
        let mut adapter = CaptureAdapter::new(Some(recognizer), "fa-IR".to_string(), tx);

        adapter.start(&LangPreference::Auto).unwrap();
        let first = adapter.active;
        assert!(first.is_some());
        adapter.start(&LangPreference::Auto).unwrap();
        assert_eq!(adapter.active, first);
    }

    #[test]
    fn test_stop_while_idle_is_a_no_op() {
        let (tx, _rx) = mpsc::channel(8);
        let adapter = CaptureAdapter::new(None, "fa-IR".to_string(), tx);
        adapter.stop();
        assert!(!adapter.is_capturing());
    }
}
