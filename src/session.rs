//! Session coordinator
//!
//! The single owner of session state. All inputs (user intents, transport
//! lifecycle, capture results, speech-output resolutions) arrive as events
//! on bounded queues and are folded here, one at a time, on one task. No
//! other component mutates session state, which keeps the session invariants
//! (capture/playback exclusion, accumulator lifecycle) enforceable in one
//! place.
//!
//! The presentation layer consumes a read-only [`SessionSnapshot`] stream and
//! produces intents through [`SessionHandle`]; it has no other surface.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};

use crate::config::SessionConfig;
use crate::lang::{classify, LangPreference};
use crate::metrics::{Diagnostics, DiagnosticsSummary};
use crate::speech::{
    AudioPlayer, CaptureAdapter, CaptureEvent, OutputEvent, Recognizer, SpeechOutput, Synthesizer,
};
use crate::transport::{
    decode_frame, ClientFrame, Connector, ResponseAccumulator, ServerEvent, TransportError,
    TransportEvent, DEFAULT_REPLY_LANG,
};

/// Depth of each event queue feeding the coordinator loop
const EVENT_QUEUE_DEPTH: usize = 32;

/// Who produced a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// One finalized message in the conversation transcript
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Transport-derived connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Disconnected,
    Connected,
}

/// Read-only session state published to the presentation layer
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub connectivity: Connectivity,
    pub capturing: bool,
    pub speaking: bool,
    /// Insertion order is display order
    pub turns: Vec<Turn>,
    /// In-progress agent response, empty between cycles
    pub partial_response: String,
    pub last_error: Option<String>,
    pub language: LangPreference,
    pub diagnostics: DiagnosticsSummary,
}

/// User intents accepted by the session
#[derive(Debug, Clone)]
pub enum SessionCommand {
    SendText(String),
    StartCapture,
    StopCapture,
    SetLanguage(LangPreference),
    /// Start a fresh connection cycle after reconnection exhaustion
    Reconnect,
    Shutdown,
}

/// Capability providers injected at construction
///
/// `None` models an environment without that capability; operations needing
/// it are refused with `Unsupported`, never probed for at call time.
#[derive(Default)]
pub struct Capabilities {
    pub recognizer: Option<Arc<dyn Recognizer>>,
    pub synthesizer: Option<Arc<dyn Synthesizer>>,
    pub player: Option<Arc<dyn AudioPlayer>>,
}

/// Handle held by the presentation layer
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub async fn send_text(&self, text: impl Into<String>) {
        let _ = self
            .commands
            .send(SessionCommand::SendText(text.into()))
            .await;
    }

    pub async fn start_capture(&self) {
        let _ = self.commands.send(SessionCommand::StartCapture).await;
    }

    pub async fn stop_capture(&self) {
        let _ = self.commands.send(SessionCommand::StopCapture).await;
    }

    pub async fn set_language(&self, preference: LangPreference) {
        let _ = self
            .commands
            .send(SessionCommand::SetLanguage(preference))
            .await;
    }

    pub async fn reconnect(&self) {
        let _ = self.commands.send(SessionCommand::Reconnect).await;
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(SessionCommand::Shutdown).await;
    }

    /// Current state snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Subscribe to state changes
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }
}

/// The coordinator itself; owns every piece of session state
pub struct Session {
    connectivity: Connectivity,
    accumulator: ResponseAccumulator,
    turns: Vec<Turn>,
    last_error: Option<String>,
    language: LangPreference,
    diagnostics: Diagnostics,
    connector: Connector,
    capture: CaptureAdapter,
    output: SpeechOutput,
}

impl Session {
    /// Wire up the components and start the coordinator loop
    ///
    /// The transport begins connecting immediately; everything else waits for
    /// intents or inbound frames.
    pub fn spawn(config: SessionConfig, capabilities: Capabilities) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (transport_tx, transport_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (capture_tx, capture_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (output_tx, output_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);

        let connector = Connector::spawn(
            config.endpoint.ws_url(),
            config.reconnect.clone(),
            transport_tx,
        );
        let capture = CaptureAdapter::new(
            capabilities.recognizer,
            config.capture_lang.clone(),
            capture_tx,
        );
        let output = SpeechOutput::new(
            config.endpoint.synthesis_base(),
            capabilities.synthesizer,
            capabilities.player,
            output_tx,
        );

        let session = Session {
            connectivity: Connectivity::Disconnected,
            accumulator: ResponseAccumulator::new(),
            turns: Vec::new(),
            last_error: None,
            language: config.language.clone(),
            diagnostics: Diagnostics::new(),
            connector,
            capture,
            output,
        };

        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
        tokio::spawn(session.run(command_rx, transport_rx, capture_rx, output_rx, snapshot_tx));

        SessionHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut transport_events: mpsc::Receiver<TransportEvent>,
        mut capture_events: mpsc::Receiver<CaptureEvent>,
        mut output_events: mpsc::Receiver<OutputEvent>,
        snapshots: watch::Sender<SessionSnapshot>,
    ) {
        log::info!("Session loop started");
        self.connector.connect().await;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => {
                        self.shutdown().await;
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                },
                Some(event) = transport_events.recv() => self.handle_transport(event),
                Some(event) = capture_events.recv() => self.handle_capture(event).await,
                Some(event) = output_events.recv() => self.handle_output(event),
            }

            snapshots.send_replace(self.snapshot());
        }

        snapshots.send_replace(self.snapshot());
        log::info!("Session loop ended");
    }

    async fn shutdown(&mut self) {
        log::info!("Session shutting down");
        self.output.cancel();
        self.capture.stop();
        self.connector.close().await;
        self.connectivity = Connectivity::Disconnected;
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        log::debug!("Command: {:?}", command);
        match command {
            SessionCommand::SendText(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    log::debug!("Ignoring empty outbound message");
                    return;
                }
                self.forward_user_message(trimmed.to_string()).await;
            }
            SessionCommand::StartCapture => self.start_capture(),
            SessionCommand::StopCapture => self.capture.stop(),
            SessionCommand::SetLanguage(preference) => {
                log::info!("Language preference set to {}", preference);
                self.language = preference;
            }
            SessionCommand::Reconnect => self.connector.connect().await,
            SessionCommand::Shutdown => unreachable!("Shutdown is handled in the run loop"),
        }
    }

    /// Route one user message: classify, forward, record the turn
    ///
    /// Used by both the typed-text intent and completed capture utterances.
    async fn forward_user_message(&mut self, text: String) {
        if self.connectivity == Connectivity::Disconnected {
            self.set_error(TransportError::NotConnected.to_string());
            return;
        }

        let lang = classify(&text, &self.language);
        self.connector
            .send(ClientFrame::message(text.clone(), Some(lang)))
            .await;

        // Optimistic append; the turn is ours the moment we hand it over
        self.push_turn(Role::User, text);
        self.diagnostics.turn_sent();
    }

    fn start_capture(&mut self) {
        if self.connectivity == Connectivity::Disconnected {
            log::warn!("Capture refused while disconnected");
            return;
        }

        // Capture and playback never overlap; release the audio channel first
        if self.output.is_speaking() {
            self.output.cancel();
        }

        if let Err(e) = self.capture.start(&self.language) {
            log::warn!("Capture refused: {}", e);
            self.set_error(e.to_string());
        }
    }

    fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                log::info!("Session connected");
                self.connectivity = Connectivity::Connected;
                self.last_error = None;
            }
            TransportEvent::Closed => {
                log::info!("Session disconnected");
                self.connectivity = Connectivity::Disconnected;
            }
            TransportEvent::Error(message) => self.set_error(message),
            TransportEvent::Frame(raw) => {
                self.diagnostics.frame_received();
                match decode_frame(&raw) {
                    Some(event) => self.apply_server_event(event),
                    None => self.diagnostics.frame_dropped(),
                }
            }
        }
    }

    fn apply_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Delta { text } => {
                self.accumulator.push_delta(text.as_deref().unwrap_or_default());
            }
            ServerEvent::Done { text, lang } => {
                self.accumulator.clear();

                let Some(text) = text.filter(|t| !t.is_empty()) else {
                    // A textless done is a valid, intentionally inert frame
                    log::debug!("Inert done frame");
                    return;
                };

                // Capture must be closed before new audio is requested
                if self.capture.is_capturing() {
                    self.capture.stop();
                }

                let lang = lang.unwrap_or_else(|| DEFAULT_REPLY_LANG.to_string());
                self.push_turn(Role::Agent, text.clone());
                self.diagnostics.turn_received();
                self.output.speak(text, lang);
            }
            ServerEvent::Estimate {
                model,
                input_tokens,
                estimated_cost_usd,
            } => {
                self.diagnostics
                    .record_estimate(model, input_tokens, estimated_cost_usd);
            }
            ServerEvent::Error { message } => {
                self.set_error(message.unwrap_or_else(|| "Unknown error".to_string()));
            }
            ServerEvent::Ack => {}
            ServerEvent::Unknown => {} // decode_frame never forwards these
        }
    }

    async fn handle_capture(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::Utterance { id, text } => {
                if !self.capture.is_current(id) {
                    log::debug!("Stale utterance ignored ({})", id);
                    return;
                }
                log::info!("Captured utterance ({} chars)", text.len());
                self.forward_user_message(text).await;
            }
            CaptureEvent::Failed { id, error } => {
                if self.capture.is_current(id) {
                    // Surfaced only as capturing returning to false
                    log::warn!("Capture failed: {}", error);
                    self.diagnostics.record_error(format!("capture: {}", error));
                }
            }
            CaptureEvent::Ended { id } => {
                self.capture.acknowledge_end(id);
            }
        }
    }

    fn handle_output(&mut self, event: OutputEvent) {
        match event {
            OutputEvent::Finished { id } => {
                self.output.acknowledge_finished(id);
            }
        }
    }

    fn push_turn(&mut self, role: Role, text: String) {
        self.turns.push(Turn {
            role,
            text,
            at: Utc::now(),
        });
    }

    fn set_error(&mut self, message: String) {
        log::warn!("Session error: {}", message);
        self.diagnostics.record_error(message.clone());
        self.last_error = Some(message);
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            connectivity: self.connectivity,
            capturing: self.capture.is_capturing(),
            speaking: self.output.is_speaking(),
            turns: self.turns.clone(),
            partial_response: self.accumulator.text().to_string(),
            last_error: self.last_error.clone(),
            language: self.language.clone(),
            diagnostics: self.diagnostics.summary(),
        }
    }
}
