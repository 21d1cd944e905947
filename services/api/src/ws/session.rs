//! Manages the WebSocket connection lifecycle for a live tutoring session.

use super::{
    protocol::{ClientMessage, ServerMessage},
    provider::{self, LiveChannel, LiveCommand},
};
use crate::{models::StepView, state::AppState};
use anyhow::{Result, anyhow};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use foundry_core::{
    StepCatalog, TickReport, TutoringLoop, cancel::cancel_pair, metadata::SessionMetadata,
    prompts,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{Instrument, error, info, instrument, warn};
use uuid::Uuid;

/// The client half of the browser socket, shared by every task that talks to it.
pub type ClientSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Resolves the course for a session from the `init` message text.
fn parse_init(init_text: &str, state: &AppState) -> Result<(String, StepCatalog)> {
    let ClientMessage::Init { metadata } = serde_json::from_str::<ClientMessage>(init_text)?
    else {
        return Err(anyhow!("First message must be `init`"));
    };
    let (course_title, catalog) =
        SessionMetadata::from_json(metadata.as_deref()).into_session_parts(&state.course_defaults)?;
    Ok((course_title, catalog))
}

/// Entry point for a new connection.
///
/// Waits for the `init` message, confirms the course to the client, and then
/// runs the session until the client goes away.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", session_id.to_string().as_str());
    info!("New WebSocket connection. Awaiting initialization...");

    let (socket_tx, mut socket_rx) = socket.split();
    let socket_tx: ClientSink = Arc::new(Mutex::new(socket_tx));

    let init = match socket_rx.next().await {
        Some(Ok(Message::Text(text))) => parse_init(text.as_str(), &state),
        Some(Ok(_)) => Err(anyhow!("First message was not a text `init` message.")),
        Some(Err(e)) => Err(e.into()),
        None => {
            info!("Client disconnected before sending init message.");
            return;
        }
    };

    let (course_title, catalog) = match init {
        Ok(parts) => parts,
        Err(e) => {
            error!("Session initialization failed: {:?}", e);
            let _ = send_msg(
                &mut *socket_tx.lock().await,
                ServerMessage::Error {
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    };

    if send_msg(
        &mut *socket_tx.lock().await,
        ServerMessage::Initialized {
            session_id,
            course_title: course_title.clone(),
            steps: catalog.iter().cloned().map(StepView::from).collect(),
        },
    )
    .await
    .is_err()
    {
        error!("Failed to send Initialized message to client.");
        return;
    }

    let session_span =
        tracing::info_span!("tutor_session", %session_id, course = %course_title);
    if let Err(e) = run_session(state, socket_tx.clone(), socket_rx, course_title, catalog)
        .instrument(session_span)
        .await
    {
        error!(error = ?e, "Tutoring session terminated with error.");
        let _ = send_msg(
            &mut *socket_tx.lock().await,
            ServerMessage::Error {
                message: e.to_string(),
            },
        )
        .await;
    }
}

/// Runs one tutoring session.
///
/// The live model connection and the tutoring loop each run in their own
/// task. This task relays client audio and video to the model and step
/// updates back to the client, and cancels the loop when the client leaves.
async fn run_session(
    state: Arc<AppState>,
    socket_tx: ClientSink,
    mut socket_rx: SplitStream<WebSocket>,
    course_title: String,
    catalog: StepCatalog,
) -> Result<()> {
    let system_instruction = prompts::orientation(&course_title, &catalog);
    let (live_tx, live_handle) =
        provider::start_live_provider(&state, system_instruction, socket_tx.clone())?;

    let (cancel_handle, cancel_signal) = cancel_pair();
    let (report_tx, mut report_rx) = mpsc::channel::<TickReport>(16);

    let mut tutor = TutoringLoop::new(
        course_title,
        catalog,
        LiveChannel::new(live_tx.clone()),
        state.config.tutor.clone(),
        cancel_signal,
    )
    .with_reports(report_tx);

    let tutor_sink = socket_tx.clone();
    let tutor_handle = tokio::spawn(
        async move {
            let ended = match tutor.run().await {
                Ok(outcome) => {
                    info!(?outcome, "Tutoring loop finished.");
                    ServerMessage::SessionEnded { outcome }
                }
                Err(e) => {
                    error!(error = %e, "Tutoring loop failed.");
                    ServerMessage::Error {
                        message: format!("Tutoring stopped: {}", e),
                    }
                }
            };
            let _ = send_msg(&mut *tutor_sink.lock().await, ended).await;
        }
        .in_current_span(),
    );

    loop {
        tokio::select! {
            Some(msg_result) = socket_rx.next() => {
                match msg_result {
                    Ok(Message::Binary(data)) => {
                        if live_tx.send(LiveCommand::Audio(data.to_vec())).await.is_err() {
                            warn!("Received audio data from client, but the live connection is gone.");
                        }
                    }
                    Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::VideoFrame { data }) => {
                            if live_tx.send(LiveCommand::VideoFrame(data)).await.is_err() {
                                warn!("Received a video frame, but the live connection is gone.");
                            }
                        }
                        Ok(ClientMessage::Init { .. }) => warn!("Ignoring repeated `init` message."),
                        Err(e) => warn!(error = %e, "Ignoring unreadable client message."),
                    },
                    Ok(Message::Close(_)) => {
                        info!("Client sent close frame. Shutting down session.");
                        break;
                    }
                    Ok(Message::Ping(_) | Message::Pong(_)) => {}
                    Err(e) => {
                        error!("Error receiving from client WebSocket: {:?}", e);
                        break;
                    }
                }
            },
            Some(report) = report_rx.recv() => {
                if let Err(e) = send_msg(&mut *socket_tx.lock().await, report.into()).await {
                    warn!(error = ?e, "Could not deliver step update; closing session.");
                    break;
                }
            },
            // Client stream ended and the loop stopped reporting.
            else => break,
        }
    }

    // The loop stops at its next await once cancelled; the provider goes with it.
    cancel_handle.cancel();
    drop(report_rx);
    if let Err(e) = tutor_handle.await {
        error!(error = ?e, "Tutoring task panicked.");
    }
    live_handle.abort();
    info!("WebSocket connection closed and tutoring session terminated.");
    Ok(())
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
