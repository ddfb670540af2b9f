//! Reconnecting WebSocket connector
//!
//! Owns the one streaming duplex connection to the agent server. The
//! connection lives on a dedicated task; the session coordinator drives it
//! through commands and observes it through lifecycle events.
//!
//! # Reconnection Strategy
//!
//! Every unsolicited close schedules a retry after `min(2^attempt * base, cap)`,
//! with `attempt` counting from 0 up to a configured maximum. A successful
//! open resets the counter. Once the maximum is exhausted no further attempt
//! is scheduled; the session stays disconnected until an explicit reconnect
//! request. Deliberate teardown cancels any pending retry timer.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use super::protocol::ClientFrame;
use super::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection timeout for the WebSocket handshake
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Depth of the command queue between coordinator and connector task
const COMMAND_QUEUE_DEPTH: usize = 32;

/// Exponential-backoff reconnection policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Base delay in milliseconds, doubled for each failed attempt
    pub base_delay_ms: u64,
    /// Attempts scheduled automatically before giving up
    pub max_attempts: u32,
    /// Upper bound on any single delay, in milliseconds
    pub cap_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_attempts: 6,
            cap_ms: 30_000,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnection attempt `attempt` (0-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.cap_ms))
    }
}

/// Lifecycle events emitted by the connector task
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The connection is open and frames can flow
    Opened,
    /// One inbound frame, raw wire text
    Frame(String),
    /// The connection is gone, solicited or not
    Closed,
    /// A failure that did not necessarily close the connection
    Error(String),
}

#[derive(Debug)]
enum Command {
    Connect,
    Send(ClientFrame),
    Close,
}

/// Handle to the connector task
///
/// Dropping the handle (with the owning session) tears the task down.
#[derive(Clone)]
pub struct Connector {
    cmd_tx: mpsc::Sender<Command>,
}

impl Connector {
    /// Spawn the connector task for `url`, reporting lifecycle over `events`
    ///
    /// No connection is attempted until [`Connector::connect`] is called.
    pub fn spawn(url: String, policy: ReconnectPolicy, events: mpsc::Sender<TransportEvent>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        tokio::spawn(run_connector(url, policy, cmd_rx, events));
        Self { cmd_tx }
    }

    /// Request a connection; no-op if already connected or connecting
    pub async fn connect(&self) {
        let _ = self.cmd_tx.send(Command::Connect).await;
    }

    /// Send one outbound frame
    ///
    /// If the channel is not open the connector reports
    /// [`TransportError::NotConnected`] as a [`TransportEvent::Error`].
    pub async fn send(&self, frame: ClientFrame) {
        let _ = self.cmd_tx.send(Command::Send(frame)).await;
    }

    /// Deliberate teardown: close the socket and cancel any pending retry
    ///
    /// Always safe to call; a later [`Connector::connect`] starts a fresh
    /// attempt cycle.
    pub async fn close(&self) {
        let _ = self.cmd_tx.send(Command::Close).await;
    }
}

async fn run_connector(
    url: String,
    policy: ReconnectPolicy,
    mut cmd_rx: mpsc::Receiver<Command>,
    events: mpsc::Sender<TransportEvent>,
) {
    let mut socket: Option<WsStream> = None;
    let mut attempt: u32 = 0;
    let mut retry_at: Option<Instant> = None;

    log::debug!("Connector task started for {}", url);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Connect) => {
                    if socket.is_some() || retry_at.is_some() {
                        log::debug!("Connect requested while already connected or connecting");
                    } else {
                        attempt = 0;
                        try_open(&url, &policy, &events, &mut socket, &mut attempt, &mut retry_at).await;
                    }
                }
                Some(Command::Send(frame)) => {
                    send_frame(frame, &policy, &events, &mut socket, &mut attempt, &mut retry_at).await;
                }
                Some(Command::Close) => {
                    retry_at = None;
                    attempt = 0;
                    if let Some(mut ws) = socket.take() {
                        if let Err(e) = ws.close(None).await {
                            log::debug!("Error closing WebSocket: {}", e);
                        }
                        if events.send(TransportEvent::Closed).await.is_err() {
                            break;
                        }
                    }
                }
                None => {
                    if let Some(mut ws) = socket.take() {
                        let _ = ws.close(None).await;
                    }
                    break;
                }
            },

            inbound = async { socket.as_mut().expect("guarded by is_some").next().await },
                if socket.is_some() =>
            {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if events.send(TransportEvent::Frame(text)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        log::info!("WebSocket closed by server");
                        socket = None;
                        if events.send(TransportEvent::Closed).await.is_err() {
                            break;
                        }
                        schedule_retry(&policy, &mut attempt, &mut retry_at);
                    }
                    Some(Ok(_)) => {} // Ignore ping/pong/binary
                    Some(Err(e)) => {
                        log::warn!("WebSocket error: {}", e);
                        socket = None;
                        if events.send(TransportEvent::Closed).await.is_err() {
                            break;
                        }
                        schedule_retry(&policy, &mut attempt, &mut retry_at);
                    }
                }
            },

            _ = async { tokio::time::sleep_until(retry_at.expect("guarded by is_some")).await },
                if retry_at.is_some() =>
            {
                retry_at = None;
                try_open(&url, &policy, &events, &mut socket, &mut attempt, &mut retry_at).await;
            }
        }
    }

    log::debug!("Connector task exiting");
}

/// Single connection attempt; schedules the next retry on failure
async fn try_open(
    url: &str,
    policy: &ReconnectPolicy,
    events: &mpsc::Sender<TransportEvent>,
    socket: &mut Option<WsStream>,
    attempt: &mut u32,
    retry_at: &mut Option<Instant>,
) {
    log::info!("Connecting to {} (attempt {})", url, *attempt + 1);

    let connected = timeout(CONNECT_TIMEOUT, connect_async(url))
        .await
        .map_err(|_| TransportError::ConnectFailed("connection timeout".to_string()))
        .and_then(|r| r.map_err(|e| TransportError::ConnectFailed(e.to_string())));

    match connected {
        Ok((ws, _response)) => {
            log::info!("WebSocket connected");
            *socket = Some(ws);
            *attempt = 0;
            let _ = events.send(TransportEvent::Opened).await;
        }
        Err(e) => {
            log::warn!("Connection attempt failed: {}", e);
            let _ = events.send(TransportEvent::Error(e.to_string())).await;
            schedule_retry(policy, attempt, retry_at);
        }
    }
}

async fn send_frame(
    frame: ClientFrame,
    policy: &ReconnectPolicy,
    events: &mpsc::Sender<TransportEvent>,
    socket: &mut Option<WsStream>,
    attempt: &mut u32,
    retry_at: &mut Option<Instant>,
) {
    let Some(ws) = socket.as_mut() else {
        let _ = events
            .send(TransportEvent::Error(TransportError::NotConnected.to_string()))
            .await;
        return;
    };

    let json = match frame.to_wire() {
        Ok(json) => json,
        Err(e) => {
            log::error!("Failed to serialize outbound frame: {}", e);
            return;
        }
    };

    if let Err(e) = ws.send(Message::Text(json)).await {
        log::warn!("Send failed: {}", e);
        let _ = events
            .send(TransportEvent::Error(
                TransportError::SendFailed(e.to_string()).to_string(),
            ))
            .await;
        // A failed send means the socket is gone; treat it as an unsolicited close
        *socket = None;
        let _ = events.send(TransportEvent::Closed).await;
        schedule_retry(policy, attempt, retry_at);
    }
}

/// Arm the retry timer for the next attempt, unless attempts are exhausted
fn schedule_retry(policy: &ReconnectPolicy, attempt: &mut u32, retry_at: &mut Option<Instant>) {
    if *attempt >= policy.max_attempts {
        log::warn!(
            "Reconnection attempts exhausted ({}); staying disconnected until asked",
            policy.max_attempts
        );
        return;
    }

    let delay = policy.delay_for_attempt(*attempt);
    *attempt += 1;
    *retry_at = Some(Instant::now() + delay);
    log::info!(
        "Scheduling reconnection in {:?} (attempt {}/{})",
        delay,
        *attempt,
        policy.max_attempts
    );
}
