//! The realtime model connection behind a tutoring session.
//!
//! A provider task owns the upstream WebSocket. The rest of the session talks
//! to it through [`LiveCommand`]s, and the tutoring loop reaches it through
//! [`LiveChannel`], which turns each prompt into a command carrying a reply
//! slot.

pub mod gemini;

use super::{protocol::ServerMessage, session::{ClientSink, send_msg}};
use crate::state::AppState;
use anyhow::{Context, Result};
use async_trait::async_trait;
use foundry_core::{ChannelError, ConversationChannel, Prompt, Reply};
use std::sync::Arc;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::error;

/// Where the provider task sends a prompt's reply.
pub type ReplySlot = oneshot::Sender<Result<Reply, ChannelError>>;

/// An internal event passed to the active realtime provider task.
#[derive(Debug)]
pub enum LiveCommand {
    /// A chunk of microphone audio (PCM16, browser rate).
    Audio(Vec<u8>),
    /// A base64 JPEG camera frame.
    VideoFrame(String),
    /// A prompt from the tutoring loop; the model's next completed turn answers it.
    Prompt { prompt: Prompt, reply: ReplySlot },
}

/// The tutoring loop's view of the realtime model.
#[derive(Clone)]
pub struct LiveChannel {
    tx: mpsc::Sender<LiveCommand>,
}

impl LiveChannel {
    pub fn new(tx: mpsc::Sender<LiveCommand>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ConversationChannel for LiveChannel {
    async fn send(&self, prompt: Prompt) -> Result<Reply, ChannelError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LiveCommand::Prompt { prompt, reply })
            .await
            .map_err(|_| ChannelError::Closed)?;
        rx.await.map_err(|_| ChannelError::Closed)?
    }
}

/// Spawns the Gemini Live provider task for one session.
///
/// `system_instruction` becomes the model's standing instructions for the
/// whole conversation. If the task fails, the client is sent an `error`
/// message; pending prompts are answered with `ChannelError::Closed`.
pub fn start_live_provider(
    state: &Arc<AppState>,
    system_instruction: String,
    socket_tx: ClientSink,
) -> Result<(mpsc::Sender<LiveCommand>, JoinHandle<()>)> {
    let api_key = state
        .config
        .gemini_api_key
        .clone()
        .context("GEMINI_API_KEY is required for live tutoring sessions")?;
    let model = state.config.live_model.clone();
    let (tx, rx) = mpsc::channel(128);

    let handle = tokio::spawn(async move {
        let settings = gemini::LiveSettings {
            api_key,
            model,
            system_instruction,
        };
        if let Err(e) = gemini::run(settings, rx, socket_tx.clone()).await {
            error!(error = ?e, "Realtime provider task failed");
            let mut sink = socket_tx.lock().await;
            let _ = send_msg(
                &mut sink,
                ServerMessage::Error {
                    message: format!("Voice connection failed: {}", e),
                },
            )
            .await;
        }
    });

    Ok((tx, handle))
}
