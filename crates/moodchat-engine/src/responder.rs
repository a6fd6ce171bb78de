use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use moodchat_core::{BackendError, ChatBackend, ChatTurn, ConnectionId, Emotion};
use moodchat_telemetry::names;
use moodchat_telemetry::MetricsRecorder;

use crate::commands::{CommandDispatcher, Dispatch};
use crate::fallback::fallback_reply;
use crate::prompts::context_prompt;
use crate::session::SessionStore;

/// Turns a chat message into a reply: commands first, then the backend,
/// then a canned greeting if the backend cannot answer.
pub struct ResponseGenerator {
    backend: Arc<dyn ChatBackend>,
    sessions: Arc<SessionStore>,
    dispatcher: CommandDispatcher,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl ResponseGenerator {
    pub fn new(backend: Arc<dyn ChatBackend>, sessions: Arc<SessionStore>) -> Self {
        let dispatcher = CommandDispatcher::new(Arc::clone(&backend), Arc::clone(&sessions));
        Self {
            backend,
            sessions,
            dispatcher,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<Arc<MetricsRecorder>>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Never returns an empty string.
    #[instrument(skip(self, id, message), fields(connection_id = %id, emotion = %emotion))]
    pub async fn respond(&self, id: &ConnectionId, message: &str, emotion: Emotion) -> String {
        self.sessions.get_or_create(id);
        if let Dispatch::Reply(reply) = self.dispatcher.dispatch(id, message).await {
            return reply;
        }

        let window = self.sessions.config().context_window;
        let context = self
            .sessions
            .update(id, |s| {
                s.current_emotion = emotion;
                let turn = if s.history.is_empty() {
                    ChatTurn::user(context_prompt(emotion))
                } else {
                    ChatTurn::user(message)
                };
                s.history.push(turn);
                s.history.window(window)
            })
            .await;

        let started = Instant::now();
        let result = match self.backend.complete(&context, message).await {
            Ok(text) if text.trim().is_empty() => {
                Err(BackendError::InvalidResponse("empty reply".into()))
            }
            other => other,
        };
        self.observe_latency(started);

        match result {
            Ok(reply) => {
                debug!(context_len = context.len(), reply_len = reply.len(), "backend replied");
                let recorded = self
                    .sessions
                    .update_existing(id, |s| s.history.push(ChatTurn::model(reply.clone())))
                    .await;
                if recorded.is_none() {
                    debug!("session closed before the reply arrived");
                }
                reply
            }
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), backend = self.backend.name(), "chat backend failed, using fallback");
                self.count(names::BACKEND_FAILURES_TOTAL, &[("kind", e.error_kind())]);
                self.count(names::FALLBACK_RESPONSES_TOTAL, &[("emotion", emotion.label())]);
                fallback_reply(emotion).to_string()
            }
        }
    }

    fn observe_latency(&self, started: Instant) {
        if let Some(m) = &self.metrics {
            let ms = started.elapsed().as_secs_f64() * 1000.0;
            m.histogram_observe(names::BACKEND_LATENCY_MS, &[], ms);
        }
    }

    fn count(&self, name: &str, labels: &[(&str, &str)]) {
        if let Some(m) = &self.metrics {
            m.counter_inc(name, labels, 1);
        }
    }
}
