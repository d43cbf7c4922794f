use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Client -> server frame: the text to publish into the session's room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundFrame {
    pub text: String,
}

/// Server -> client frames
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundFrame {
    /// A delivered room message, replayed or live
    Message(Message),
    /// A session-local error report
    Error { message: String },
}

impl OutboundFrame {
    pub fn message(message: Message) -> Self {
        OutboundFrame::Message(message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        OutboundFrame::Error {
            message: message.into(),
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
