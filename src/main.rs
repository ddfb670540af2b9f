//! Terminal front end for the voxlink session
//!
//! A minimal presentation layer: renders session snapshots as they change and
//! forwards typed lines as intents. All conversation state lives in the
//! library; this binary holds none.

use std::io::BufRead;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use voxlink::session::SessionSnapshot;
use voxlink::{Capabilities, Connectivity, LangPreference, Role, Session, SessionConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Load .env file if present (for development convenience)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match voxlink::config::default_settings_path() {
        Ok(path) => voxlink::load_settings(&path),
        Err(e) => {
            log::warn!("Settings: {}", e);
            SessionConfig::default()
        }
    };

    println!("voxlink: connecting to {}", config.endpoint.ws_url());
    println!("Type a message, or /lang <auto|fa-IR|en-US>, /mic, /stop, /reconnect, /quit");

    // This host has no speech engines; voice intents are refused as unsupported
    let session = Session::spawn(config, Capabilities::default());

    let renderer = tokio::spawn(render_loop(session.watch()));

    // stdin is blocking; bridge it over a channel from a plain thread
    let (line_tx, mut line_rx) = tokio::sync::mpsc::channel::<String>(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    while let Some(line) = line_rx.recv().await {
        let line = line.trim().to_string();
        match line.as_str() {
            "" => {}
            "/quit" => break,
            "/reconnect" => session.reconnect().await,
            "/mic" => session.start_capture().await,
            "/stop" => session.stop_capture().await,
            _ if line.starts_with("/lang ") => {
                let tag = line["/lang ".len()..].trim().to_string();
                session.set_language(LangPreference::from(tag)).await;
            }
            _ => session.send_text(line).await,
        }
    }

    session.shutdown().await;
    renderer.abort();
}

/// Print state changes: connectivity, streamed partial text, finished turns
async fn render_loop(mut snapshots: watch::Receiver<SessionSnapshot>) {
    let mut printed_turns = 0usize;
    let mut last_connectivity: Option<Connectivity> = None;
    let mut last_error: Option<String> = None;
    let mut partial_shown = false;

    loop {
        {
            let snapshot = snapshots.borrow_and_update().clone();

            if last_connectivity != Some(snapshot.connectivity) {
                last_connectivity = Some(snapshot.connectivity);
                match snapshot.connectivity {
                    Connectivity::Connected => println!("[connected]"),
                    Connectivity::Disconnected => println!("[disconnected]"),
                }
            }

            if snapshot.last_error != last_error {
                last_error = snapshot.last_error.clone();
                if let Some(error) = &last_error {
                    println!("[error] {}", error);
                }
            }

            for turn in &snapshot.turns[printed_turns..] {
                if partial_shown {
                    println!();
                    partial_shown = false;
                }
                let who = match turn.role {
                    Role::User => "you",
                    Role::Agent => "agent",
                };
                println!("{}: {}", who, turn.text);
            }
            printed_turns = snapshot.turns.len();

            if !snapshot.partial_response.is_empty() {
                print!("\ragent: {}", snapshot.partial_response);
                use std::io::Write;
                let _ = std::io::stdout().flush();
                partial_shown = true;
            } else if partial_shown {
                println!();
                partial_shown = false;
            }
        }

        if snapshots.changed().await.is_err() {
            break;
        }
    }
}
