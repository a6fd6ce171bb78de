use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use moodchat_core::{ConnectionId, Emotion};

use crate::error::EngineError;
use crate::history::HistoryBuffer;

pub const DEFAULT_HISTORY_CAP: usize = 50;
pub const DEFAULT_CONTEXT_WINDOW: usize = 5;

/// Sizing for per-session conversation history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Turns retained per session.
    pub history_cap: usize,
    /// Turns sent to the backend with each message.
    pub context_window: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_cap: DEFAULT_HISTORY_CAP,
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.context_window == 0 {
            return Err(EngineError::InvalidConfig("context window must be at least 1".into()));
        }
        if self.history_cap < self.context_window {
            return Err(EngineError::InvalidConfig(format!(
                "history cap {} is smaller than context window {}",
                self.history_cap, self.context_window
            )));
        }
        Ok(())
    }
}

/// State for one connected client.
#[derive(Debug)]
pub struct Session {
    pub emotion_detection_enabled: bool,
    pub current_emotion: Emotion,
    pub history: HistoryBuffer,
}

impl Session {
    pub fn new(history_cap: usize) -> Self {
        Self {
            emotion_detection_enabled: false,
            current_emotion: Emotion::Neutral,
            history: HistoryBuffer::new(history_cap),
        }
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

/// Sessions keyed by connection.
///
/// Each session has its own async mutex; callers must not hold it across
/// backend calls.
pub struct SessionStore {
    sessions: DashMap<ConnectionId, SessionHandle>,
    config: SessionConfig,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            sessions: DashMap::new(),
            config,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Look up a session, creating it with defaults on first reference.
    pub fn get_or_create(&self, id: &ConnectionId) -> SessionHandle {
        if let Some(existing) = self.sessions.get(id) {
            return Arc::clone(existing.value());
        }
        let entry = self.sessions.entry(id.clone()).or_insert_with(|| {
            debug!(connection_id = %id, "session created");
            Arc::new(Mutex::new(Session::new(self.config.history_cap)))
        });
        Arc::clone(entry.value())
    }

    /// Apply `f` under the session lock.
    pub async fn update<R>(&self, id: &ConnectionId, f: impl FnOnce(&mut Session) -> R) -> R {
        let handle = self.get_or_create(id);
        let mut session = handle.lock().await;
        f(&mut session)
    }

    /// Like [`update`](Self::update) but never creates. Returns `None` once
    /// the session has been removed, so late writes from in-flight work are
    /// dropped instead of resurrecting a closed connection's state.
    pub async fn update_existing<R>(
        &self,
        id: &ConnectionId,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Option<R> {
        let handle = self.sessions.get(id).map(|entry| Arc::clone(entry.value()))?;
        let mut session = handle.lock().await;
        Some(f(&mut session))
    }

    pub fn remove(&self, id: &ConnectionId) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            debug!(connection_id = %id, "session removed");
        }
        removed
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
