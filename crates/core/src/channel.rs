//! The conversational channel the tutor speaks through.
//!
//! A channel is backed by a realtime multimodal model that also receives the
//! user's live audio and video. The tutor never touches that feed directly; it
//! only sends text prompts and reads back the model's reply.

use async_trait::async_trait;
use std::time::Duration;

/// A text prompt sent to the realtime model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// Scripted instructions the model should act on (orientation, step introductions).
    Instructions(String),
    /// Text presented to the model as if the user had said it.
    UserInput(String),
}

impl Prompt {
    pub fn text(&self) -> &str {
        match self {
            Prompt::Instructions(text) | Prompt::UserInput(text) => text,
        }
    }
}

/// The model's reply to a prompt, as an ordered list of content items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub content: Vec<String>,
}

impl Reply {
    pub fn new(content: Vec<String>) -> Self {
        Self { content }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![text.into()],
        }
    }

    /// The last content item, or an empty string for an empty reply.
    pub fn final_text(&self) -> &str {
        self.content.last().map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("no reply from the model within {0:?}")]
    Timeout(Duration),
    #[error("conversation channel is closed")]
    Closed,
    #[error("conversation channel failed: {0}")]
    Transport(String),
}

/// Sends a prompt to the realtime model and waits for its reply.
///
/// Callers that only need the model to speak may ignore the returned reply,
/// but must still await it so utterances stay strictly ordered.
#[async_trait]
pub trait ConversationChannel: Send + Sync {
    async fn send(&self, prompt: Prompt) -> Result<Reply, ChannelError>;
}

#[async_trait]
impl<T: ConversationChannel + ?Sized> ConversationChannel for std::sync::Arc<T> {
    async fn send(&self, prompt: Prompt) -> Result<Reply, ChannelError> {
        (**self).send(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_text_takes_last_item() {
        let reply = Reply::new(vec!["Let me look.".into(), "Awesome, step complete".into()]);
        assert_eq!(reply.final_text(), "Awesome, step complete");
    }

    #[test]
    fn test_final_text_of_empty_reply() {
        assert_eq!(Reply::default().final_text(), "");
    }

    #[test]
    fn test_channel_error_display() {
        assert_eq!(
            ChannelError::Timeout(Duration::from_secs(30)).to_string(),
            "no reply from the model within 30s"
        );
        assert_eq!(
            ChannelError::Transport("socket reset".into()).to_string(),
            "conversation channel failed: socket reset"
        );
    }
}
