use std::sync::Arc;

use tracing::{info, warn};

use moodchat_core::{ChatBackend, ConnectionId};

use crate::prompts::{music_prompt, MUSIC_UNAVAILABLE};
use crate::session::SessionStore;

pub const HELP_TEXT: &str = "Available commands:\n\
/start_emotion - Start emotion detection\n\
/stop_emotion - Stop emotion detection\n\
/music - Get music suggestions\n\
/help - Show this help message";

const MUSIC_HEADER: &str = "Here are some music suggestions based on your current emotion:";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    StartEmotion,
    StopEmotion,
    Music,
    Help,
}

impl Command {
    /// Exact match after trimming and lowercasing.
    pub fn parse(message: &str) -> Option<Self> {
        match message.trim().to_lowercase().as_str() {
            "/start_emotion" => Some(Self::StartEmotion),
            "/stop_emotion" => Some(Self::StopEmotion),
            "/music" => Some(Self::Music),
            "/help" => Some(Self::Help),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StartEmotion => "/start_emotion",
            Self::StopEmotion => "/stop_emotion",
            Self::Music => "/music",
            Self::Help => "/help",
        }
    }
}

/// Outcome of offering a message to the dispatcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    Reply(String),
    NotACommand,
}

pub struct CommandDispatcher {
    backend: Arc<dyn ChatBackend>,
    sessions: Arc<SessionStore>,
}

impl CommandDispatcher {
    pub fn new(backend: Arc<dyn ChatBackend>, sessions: Arc<SessionStore>) -> Self {
        Self { backend, sessions }
    }

    pub async fn dispatch(&self, id: &ConnectionId, message: &str) -> Dispatch {
        let Some(command) = Command::parse(message) else {
            return Dispatch::NotACommand;
        };
        // Any recognised command initializes the session, even /help.
        self.sessions.get_or_create(id);

        let reply = match command {
            Command::StartEmotion => {
                self.sessions
                    .update(id, |s| s.emotion_detection_enabled = true)
                    .await;
                info!(connection_id = %id, "emotion detection enabled");
                "Started emotion detection.".to_string()
            }
            Command::StopEmotion => {
                self.sessions
                    .update(id, |s| s.emotion_detection_enabled = false)
                    .await;
                info!(connection_id = %id, "emotion detection disabled");
                "Stopped emotion detection.".to_string()
            }
            Command::Music => {
                let emotion = self.sessions.update(id, |s| s.current_emotion).await;
                let suggestion = match self.backend.complete(&[], music_prompt(emotion)).await {
                    Ok(text) if !text.trim().is_empty() => text,
                    Ok(_) => {
                        warn!(connection_id = %id, "empty music suggestion");
                        MUSIC_UNAVAILABLE.to_string()
                    }
                    Err(e) => {
                        warn!(connection_id = %id, error = %e, kind = e.error_kind(), "music suggestion failed");
                        MUSIC_UNAVAILABLE.to_string()
                    }
                };
                format!("{MUSIC_HEADER}\n\n{suggestion}")
            }
            Command::Help => HELP_TEXT.to_string(),
        };
        Dispatch::Reply(reply)
    }
}
