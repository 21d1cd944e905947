//! Handles the real-time WebSocket connection to Google Gemini Live.
//!
//! Browser audio and camera frames are streamed as realtime input. Prompts
//! from the tutoring loop are sent as complete user turns, and each completed
//! model turn answers the oldest waiting prompt with the transcript of what
//! the model said. The model's audio is relayed to the browser as it arrives.
//!
//! Turns the model takes on its own (for example after the user speaks) also
//! complete the oldest waiting prompt, so a reply can occasionally belong to a
//! spoken exchange rather than to the prompt itself. Prompts whose caller
//! stopped waiting are skipped, so a turn that arrives after its prompt timed
//! out answers the next prompt instead.

use super::{LiveCommand, ReplySlot};
use crate::{
    audio_utils::InputResampler,
    ws::{
        protocol::ServerMessage,
        session::{ClientSink, send_msg},
    },
};
use anyhow::Result;
use foundry_core::{ChannelError, Prompt, Reply};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::collections::VecDeque;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message as WsMessage,
};
use tracing::{debug, error, info, warn};

const LIVE_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

type Upstream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type UpstreamSink = SplitSink<Upstream, WsMessage>;

// --- Local Gemini Live Types (for encapsulation) ---
mod live_types {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) enum ClientMessage {
        Setup(BidiGenerateContentSetup),
        RealtimeInput(BidiGenerateContentRealtimeInput),
        ClientContent(BidiGenerateContentClientContent),
    }

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct BidiGenerateContentSetup {
        pub model: String,
        pub generation_config: GenerationConfig,
        pub system_instruction: Content,
        pub input_audio_transcription: AudioTranscriptionConfig,
        pub output_audio_transcription: AudioTranscriptionConfig,
    }

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct GenerationConfig {
        pub response_modalities: Vec<ResponseModality>,
    }

    #[derive(Serialize)]
    #[serde(rename_all = "UPPERCASE")]
    pub(super) enum ResponseModality {
        Audio,
    }

    #[derive(Serialize, Default)]
    pub(super) struct AudioTranscriptionConfig {}

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct BidiGenerateContentClientContent {
        pub turns: Vec<Content>,
        pub turn_complete: bool,
    }

    #[derive(Serialize)]
    pub(super) struct Content {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub role: Option<String>,
        pub parts: Vec<Part>,
    }

    #[derive(Serialize)]
    pub(super) struct Part {
        pub text: String,
    }

    #[derive(Serialize, Default)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct BidiGenerateContentRealtimeInput {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub audio: Option<Blob>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub video: Option<Blob>,
    }

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct Blob {
        pub mime_type: String,
        pub data: String,
    }

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct ServerMessage {
        pub setup_complete: Option<serde_json::Value>,
        pub server_content: Option<LiveServerContent>,
        pub go_away: Option<serde_json::Value>,
    }

    #[derive(Deserialize, Debug, Default)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct LiveServerContent {
        pub model_turn: Option<ServerContentTurn>,
        pub input_transcription: Option<ServerTranscription>,
        pub output_transcription: Option<ServerTranscription>,
        pub turn_complete: Option<bool>,
    }

    #[derive(Deserialize, Debug)]
    pub(super) struct ServerContentTurn {
        pub parts: Vec<ServerPart>,
    }

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct ServerPart {
        pub text: Option<String>,
        pub inline_data: Option<ServerBlob>,
    }

    #[derive(Deserialize, Debug)]
    pub(super) struct ServerBlob {
        pub data: String,
    }

    #[derive(Deserialize, Debug)]
    pub(super) struct ServerTranscription {
        pub text: String,
    }
}

use live_types::{
    BidiGenerateContentClientContent, BidiGenerateContentRealtimeInput, BidiGenerateContentSetup,
    Blob, ClientMessage, Content, GenerationConfig, LiveServerContent, Part, ResponseModality,
};

/// Connection settings for one Gemini Live session.
pub struct LiveSettings {
    pub api_key: String,
    pub model: String,
    pub system_instruction: String,
}

fn setup_message(model: &str, system_instruction: &str) -> ClientMessage {
    ClientMessage::Setup(BidiGenerateContentSetup {
        model: model.to_string(),
        generation_config: GenerationConfig {
            response_modalities: vec![ResponseModality::Audio],
        },
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: system_instruction.to_string(),
            }],
        },
        input_audio_transcription: Default::default(),
        output_audio_transcription: Default::default(),
    })
}

/// Both prompt kinds are sent as a complete user turn, which makes the model
/// respond immediately.
fn prompt_message(prompt: &Prompt) -> ClientMessage {
    ClientMessage::ClientContent(BidiGenerateContentClientContent {
        turns: vec![Content {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: prompt.text().to_string(),
            }],
        }],
        turn_complete: true,
    })
}

fn audio_message(data: String) -> ClientMessage {
    ClientMessage::RealtimeInput(BidiGenerateContentRealtimeInput {
        audio: Some(Blob {
            mime_type: "audio/pcm;rate=16000".to_string(),
            data,
        }),
        ..Default::default()
    })
}

fn video_message(data: String) -> ClientMessage {
    ClientMessage::RealtimeInput(BidiGenerateContentRealtimeInput {
        video: Some(Blob {
            mime_type: "image/jpeg".to_string(),
            data,
        }),
        ..Default::default()
    })
}

/// Tracks prompts waiting for an answer and assembles the model's turns.
#[derive(Default)]
struct TurnCollector {
    waiting: VecDeque<ReplySlot>,
    transcript: String,
    speaking: bool,
}

impl TurnCollector {
    fn expect_reply(&mut self, reply: ReplySlot) {
        self.drop_abandoned();
        self.waiting.push_back(reply);
    }

    /// Forgets prompts at the front of the queue that nobody waits on anymore.
    fn drop_abandoned(&mut self) {
        while self.waiting.front().is_some_and(|slot| slot.is_closed()) {
            self.waiting.pop_front();
            debug!("Dropped a prompt that timed out before its turn arrived");
        }
    }

    /// Folds one server content message into the current turn, answering the
    /// oldest waiting prompt when the turn completes. Returns the messages to
    /// relay to the browser.
    fn absorb(&mut self, content: LiveServerContent) -> Vec<ServerMessage> {
        let mut out = Vec::new();

        if let Some(t) = content.input_transcription {
            out.push(ServerMessage::TranscriptionUpdate {
                text: t.text,
                is_final: false,
            });
        }
        if let Some(t) = content.output_transcription {
            self.transcript.push_str(&t.text);
        }
        if let Some(turn) = content.model_turn {
            if !self.speaking {
                self.speaking = true;
                out.push(ServerMessage::AiSpeakingStart);
            }
            for part in turn.parts {
                if let Some(text) = part.text {
                    self.transcript.push_str(&text);
                }
                if let Some(blob) = part.inline_data {
                    out.push(ServerMessage::AudioChunk { data: blob.data });
                }
            }
        }

        if content.turn_complete == Some(true) {
            if self.speaking {
                self.speaking = false;
                out.push(ServerMessage::AiSpeakingEnd);
            }
            let said = std::mem::take(&mut self.transcript);
            let said = said.trim();
            self.drop_abandoned();
            match self.waiting.pop_front() {
                Some(reply) => {
                    if reply.send(Ok(Reply::text(said))).is_err() {
                        debug!("Reply arrived after its prompt was abandoned");
                    }
                }
                None => debug!(said, "Model turn completed with no prompt waiting"),
            }
        }

        out
    }

    /// Answers every waiting prompt with `ChannelError::Closed`.
    fn close(&mut self) {
        for reply in self.waiting.drain(..) {
            let _ = reply.send(Err(ChannelError::Closed));
        }
    }
}

async fn send_upstream(upstream: &mut UpstreamSink, msg: &ClientMessage) -> Result<()> {
    upstream
        .send(WsMessage::Text(serde_json::to_string(msg)?.into()))
        .await?;
    Ok(())
}

/// Runs the Gemini Live connection until the command channel or the upstream
/// socket closes.
pub async fn run(
    settings: LiveSettings,
    mut rx: mpsc::Receiver<LiveCommand>,
    socket_tx: ClientSink,
) -> Result<()> {
    let url = format!("{}?key={}", LIVE_ENDPOINT, settings.api_key);
    let (ws_stream, _) = connect_async(url).await?;
    info!(model = %settings.model, "Connected to Gemini Live WebSocket.");
    let (mut upstream, mut downstream) = ws_stream.split();

    send_upstream(
        &mut upstream,
        &setup_message(&settings.model, &settings.system_instruction),
    )
    .await?;

    let mut collector = TurnCollector::default();
    let result = relay(&mut upstream, &mut downstream, &mut rx, &socket_tx, &mut collector).await;
    collector.close();
    result
}

async fn relay(
    upstream: &mut UpstreamSink,
    downstream: &mut SplitStream<Upstream>,
    rx: &mut mpsc::Receiver<LiveCommand>,
    socket_tx: &ClientSink,
    collector: &mut TurnCollector,
) -> Result<()> {
    let mut resampler = InputResampler::for_live_input()?;
    let mut is_ready = false;

    loop {
        tokio::select! {
            // Commands wait in the channel until setup completes.
            command = rx.recv(), if is_ready => {
                match command {
                    Some(LiveCommand::Audio(pcm16)) => {
                        if let Some(data) = resampler.process(&pcm16)? {
                            send_upstream(upstream, &audio_message(data)).await?;
                        }
                    }
                    Some(LiveCommand::VideoFrame(data)) => {
                        send_upstream(upstream, &video_message(data)).await?;
                    }
                    Some(LiveCommand::Prompt { prompt, reply }) => {
                        debug!(prompt = prompt.text(), "Sending prompt to Gemini");
                        collector.expect_reply(reply);
                        send_upstream(upstream, &prompt_message(&prompt)).await?;
                    }
                    None => {
                        info!("Session released the live connection.");
                        break;
                    }
                }
            },
            incoming = downstream.next() => {
                let text = match incoming {
                    Some(Ok(WsMessage::Text(text))) => text.as_str().to_owned(),
                    // Gemini delivers its JSON in binary frames as well.
                    Some(Ok(WsMessage::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
                    Some(Ok(WsMessage::Close(close_frame))) => {
                        warn!(?close_frame, "Gemini WebSocket connection closed by server.");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        error!("Error reading from Gemini WebSocket: {}", e);
                        break;
                    }
                    None => break,
                };

                let message = match serde_json::from_str::<live_types::ServerMessage>(&text) {
                    Ok(message) => message,
                    Err(_) => {
                        warn!("Failed to parse Gemini message. Raw text: {}", text);
                        continue;
                    }
                };

                if message.setup_complete.is_some() {
                    info!("Gemini session setup is complete. Ready for bidirectional streaming.");
                    is_ready = true;
                }
                if message.go_away.is_some() {
                    warn!("Gemini announced it will close the connection soon.");
                }
                if let Some(content) = message.server_content {
                    let outgoing = collector.absorb(content);
                    if !outgoing.is_empty() {
                        let mut sink = socket_tx.lock().await;
                        for msg in outgoing {
                            send_msg(&mut sink, msg).await?;
                        }
                    }
                }
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use live_types::{ServerBlob, ServerContentTurn, ServerPart, ServerTranscription};
    use serde_json::json;
    use tokio::sync::oneshot;

    fn spoken(text: &str) -> LiveServerContent {
        LiveServerContent {
            output_transcription: Some(ServerTranscription {
                text: text.to_string(),
            }),
            ..Default::default()
        }
    }

    fn audio(data: &str) -> LiveServerContent {
        LiveServerContent {
            model_turn: Some(ServerContentTurn {
                parts: vec![ServerPart {
                    text: None,
                    inline_data: Some(ServerBlob {
                        data: data.to_string(),
                    }),
                }],
            }),
            ..Default::default()
        }
    }

    fn turn_complete() -> LiveServerContent {
        LiveServerContent {
            turn_complete: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn test_setup_message_shape() {
        let value = serde_json::to_value(setup_message("models/live", "Be helpful.")).unwrap();
        assert_eq!(
            value,
            json!({
                "setup": {
                    "model": "models/live",
                    "generationConfig": {"responseModalities": ["AUDIO"]},
                    "systemInstruction": {"parts": [{"text": "Be helpful."}]},
                    "inputAudioTranscription": {},
                    "outputAudioTranscription": {}
                }
            })
        );
    }

    #[test]
    fn test_prompt_is_a_complete_user_turn() {
        let value =
            serde_json::to_value(prompt_message(&Prompt::UserInput("Am I done?".to_string())))
                .unwrap();
        assert_eq!(
            value,
            json!({
                "clientContent": {
                    "turns": [{"role": "user", "parts": [{"text": "Am I done?"}]}],
                    "turnComplete": true
                }
            })
        );
    }

    #[test]
    fn test_realtime_inputs_carry_one_blob() {
        let audio = serde_json::to_value(audio_message("AAAA".to_string())).unwrap();
        assert_eq!(
            audio,
            json!({"realtimeInput": {"audio": {"mimeType": "audio/pcm;rate=16000", "data": "AAAA"}}})
        );

        let video = serde_json::to_value(video_message("/9j/".to_string())).unwrap();
        assert_eq!(
            video,
            json!({"realtimeInput": {"video": {"mimeType": "image/jpeg", "data": "/9j/"}}})
        );
    }

    #[test]
    fn test_server_content_parses() {
        let raw = r#"{"serverContent": {
            "modelTurn": {"parts": [{"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAAA"}}]},
            "outputTranscription": {"text": "Awesome"},
            "turnComplete": false
        }}"#;
        let message: live_types::ServerMessage = serde_json::from_str(raw).unwrap();
        let content = message.server_content.unwrap();
        assert_eq!(content.output_transcription.unwrap().text, "Awesome");
        assert_eq!(content.turn_complete, Some(false));
    }

    #[tokio::test]
    async fn test_completed_turn_answers_waiting_prompt() {
        let mut collector = TurnCollector::default();
        let (tx, rx) = oneshot::channel();
        collector.expect_reply(tx);

        let mut relayed = collector.absorb(audio("AAAA"));
        relayed.extend(collector.absorb(spoken("Awesome, ")));
        relayed.extend(collector.absorb(spoken("step complete! ")));
        relayed.extend(collector.absorb(turn_complete()));

        assert_eq!(
            relayed,
            vec![
                ServerMessage::AiSpeakingStart,
                ServerMessage::AudioChunk {
                    data: "AAAA".to_string()
                },
                ServerMessage::AiSpeakingEnd,
            ]
        );
        let reply = rx.await.unwrap().unwrap();
        assert_eq!(reply.final_text(), "Awesome, step complete!");
    }

    #[tokio::test]
    async fn test_replies_are_answered_in_order() {
        let mut collector = TurnCollector::default();
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        collector.expect_reply(first_tx);
        collector.expect_reply(second_tx);

        collector.absorb(spoken("Here is the plan."));
        collector.absorb(turn_complete());
        collector.absorb(spoken("Keep going."));
        collector.absorb(turn_complete());

        assert_eq!(first_rx.await.unwrap().unwrap().final_text(), "Here is the plan.");
        assert_eq!(second_rx.await.unwrap().unwrap().final_text(), "Keep going.");
    }

    #[test]
    fn test_abandoned_prompt_is_skipped() {
        let mut collector = TurnCollector::default();
        let (stale_tx, stale_rx) = oneshot::channel();
        let (fresh_tx, mut fresh_rx) = oneshot::channel();
        collector.expect_reply(stale_tx);
        collector.expect_reply(fresh_tx);
        drop(stale_rx);

        collector.absorb(spoken("Fresh answer."));
        collector.absorb(turn_complete());

        assert_eq!(fresh_rx.try_recv().unwrap().unwrap().final_text(), "Fresh answer.");
        assert!(collector.waiting.is_empty());
    }

    #[test]
    fn test_lost_turn_does_not_shift_later_replies() {
        let mut collector = TurnCollector::default();

        // The first prompt's turn never arrives and its caller gives up.
        let (lost_tx, lost_rx) = oneshot::channel();
        collector.expect_reply(lost_tx);
        drop(lost_rx);

        for answer in ["Almost there.", "Keep going.", "Awesome, step complete"] {
            let (tx, mut rx) = oneshot::channel();
            collector.expect_reply(tx);
            collector.absorb(spoken(answer));
            collector.absorb(turn_complete());
            assert_eq!(rx.try_recv().unwrap().unwrap().final_text(), answer);
        }
        assert!(collector.waiting.is_empty());
    }

    #[test]
    fn test_user_transcription_is_relayed() {
        let mut collector = TurnCollector::default();
        let relayed = collector.absorb(LiveServerContent {
            input_transcription: Some(ServerTranscription {
                text: "is this right".to_string(),
            }),
            ..Default::default()
        });
        assert_eq!(
            relayed,
            vec![ServerMessage::TranscriptionUpdate {
                text: "is this right".to_string(),
                is_final: false
            }]
        );
    }

    #[test]
    fn test_close_fails_waiting_prompts() {
        let mut collector = TurnCollector::default();
        let (tx, mut rx) = oneshot::channel();
        collector.expect_reply(tx);

        collector.close();

        assert_eq!(rx.try_recv().unwrap(), Err(ChannelError::Closed));
    }
}
