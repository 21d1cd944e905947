//! Defines the WebSocket message protocol between the browser client and the API server.
//!
//! Microphone audio travels as binary frames (PCM16, little-endian, mono);
//! everything else is JSON tagged by `type`.

use crate::models::StepView;
use foundry_core::{SessionOutcome, StepStatus, TickReport};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Starts the tutoring session. This must be the first message.
    Init {
        /// JSON-encoded session metadata (`courseTitle`, `steps`). Absent or
        /// unreadable metadata selects the default course.
        #[serde(default)]
        metadata: Option<String>,
    },
    /// A camera frame from the user's glasses.
    VideoFrame {
        /// Base64-encoded JPEG.
        data: String,
    },
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the session and the course it will walk through.
    Initialized {
        session_id: Uuid,
        course_title: String,
        steps: Vec<StepView>,
    },
    /// The outcome of a progress check.
    StepUpdate {
        step_index: usize,
        step_title: String,
        status: StepStatus,
        /// What the tutor said when judging the step.
        judgment: String,
        /// Index of the step the user is now on.
        current_step: usize,
        total_steps: usize,
        done: bool,
    },
    /// The tutoring loop has stopped.
    SessionEnded { outcome: SessionOutcome },
    /// Reports a fatal error to the client.
    Error { message: String },
    /// An update on the user's speech-to-text transcription.
    TranscriptionUpdate { text: String, is_final: bool },
    /// A chunk of audio data (base64 encoded PCM16, 24 kHz) for the AI's voice.
    AudioChunk { data: String },
    /// Signals that the AI has started speaking.
    AiSpeakingStart,
    /// Signals that the AI has finished speaking.
    AiSpeakingEnd,
}

impl From<TickReport> for ServerMessage {
    fn from(report: TickReport) -> Self {
        ServerMessage::StepUpdate {
            step_index: report.step_index,
            step_title: report.step_title,
            status: report.judgment.status,
            judgment: report.judgment.raw_text,
            current_step: report.cursor,
            total_steps: report.total_steps,
            done: report.done,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_core::tutor::Judgment;
    use serde_json::json;

    #[test]
    fn test_init_with_metadata() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"init","metadata":"{\"courseTitle\":\"Knots\"}"}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Init {
                metadata: Some(r#"{"courseTitle":"Knots"}"#.to_string())
            }
        );
    }

    #[test]
    fn test_init_without_metadata() {
        let bare: ClientMessage = serde_json::from_str(r#"{"type":"init"}"#).unwrap();
        let null: ClientMessage =
            serde_json::from_str(r#"{"type":"init","metadata":null}"#).unwrap();
        assert_eq!(bare, ClientMessage::Init { metadata: None });
        assert_eq!(null, ClientMessage::Init { metadata: None });
    }

    #[test]
    fn test_video_frame() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"video_frame","data":"/9j/4AAQ"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::VideoFrame {
                data: "/9j/4AAQ".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_client_message_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"user_message"}"#).is_err());
    }

    #[test]
    fn test_step_update_from_tick_report() {
        let report = TickReport {
            step_index: 0,
            step_title: "Turn off power".to_string(),
            judgment: Judgment {
                raw_text: "Awesome, step complete!".to_string(),
                status: StepStatus::Complete,
            },
            cursor: 1,
            total_steps: 6,
            done: false,
        };

        let value = serde_json::to_value(ServerMessage::from(report)).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "step_update",
                "step_index": 0,
                "step_title": "Turn off power",
                "status": "complete",
                "judgment": "Awesome, step complete!",
                "current_step": 1,
                "total_steps": 6,
                "done": false
            })
        );
    }

    #[test]
    fn test_unit_variants_serialize_as_tags() {
        assert_eq!(
            serde_json::to_value(ServerMessage::AiSpeakingEnd).unwrap(),
            json!({"type": "ai_speaking_end"})
        );
    }
}
