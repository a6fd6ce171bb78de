//! Wire envelopes exchanged over the WebSocket.
//!
//! Every text frame is one JSON object of the form
//! `{"type": "<event>", "data": {...}}`.

use serde::{Deserialize, Serialize};

use crate::emotion::Emotion;

/// Events sent by the browser.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// A webcam frame, base64 with an optional `data:image/...;base64,` prefix.
    ProcessFrame { image: String },
    ChatMessage { message: String },
}

impl ClientEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProcessFrame { .. } => "process_frame",
            Self::ChatMessage { .. } => "chat_message",
        }
    }
}

/// Events sent to the browser.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    EmotionDetected { emotion: Emotion },
    ChatResponse { message: String },
    Error { message: String },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
