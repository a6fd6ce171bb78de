use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error};

use moodchat_core::{ChatBackend, ClientEvent, ConnectionId, ServerEvent};
use moodchat_engine::{ResponseGenerator, SessionStore};
use moodchat_telemetry::{names, MetricsRecorder};
use moodchat_vision::FramePipeline;

pub const FRAME_ERROR: &str = "Error processing frame";
pub const CHAT_ERROR: &str = "Error processing message";
pub const INVALID_EVENT: &str = "Invalid event";

/// Everything an inbound event needs.
pub struct HandlerState {
    pub sessions: Arc<SessionStore>,
    pub responder: ResponseGenerator,
    pub pipeline: FramePipeline,
    pub metrics: Option<Arc<MetricsRecorder>>,
    pub started_at: Instant,
}

impl HandlerState {
    pub fn new(
        sessions: Arc<SessionStore>,
        backend: Arc<dyn ChatBackend>,
        pipeline: FramePipeline,
        metrics: Option<Arc<MetricsRecorder>>,
    ) -> Self {
        let responder =
            ResponseGenerator::new(backend, Arc::clone(&sessions)).with_metrics(metrics.clone());
        Self {
            sessions,
            responder,
            pipeline,
            metrics,
            started_at: Instant::now(),
        }
    }

    pub fn count(&self, name: &str, labels: &[(&str, &str)]) {
        if let Some(m) = &self.metrics {
            m.counter_inc(name, labels, 1);
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Run one inbound event to completion.
///
/// The handler runs in its own task so a panic surfaces as a generic
/// `error` event instead of tearing down the connection. Dropping the
/// returned future (connection closed) aborts that task.
pub async fn handle_event(
    state: Arc<HandlerState>,
    id: ConnectionId,
    event: ClientEvent,
) -> Option<ServerEvent> {
    let kind = event.kind();
    let task = AbortOnDropHandle::new(tokio::spawn(dispatch(state, id.clone(), event)));
    match task.await {
        Ok(reply) => reply,
        Err(e) => {
            error!(connection_id = %id, kind, error = %e, "event handler failed");
            Some(ServerEvent::error(match kind {
                "process_frame" => FRAME_ERROR,
                _ => CHAT_ERROR,
            }))
        }
    }
}

async fn dispatch(state: Arc<HandlerState>, id: ConnectionId, event: ClientEvent) -> Option<ServerEvent> {
    match event {
        ClientEvent::ProcessFrame { image } => handle_frame(&state, &id, image).await,
        ClientEvent::ChatMessage { message } => Some(handle_chat(&state, &id, &message).await),
    }
}

/// Silent unless detection is enabled and a face is classified.
pub async fn handle_frame(state: &HandlerState, id: &ConnectionId, image: String) -> Option<ServerEvent> {
    state.count(names::FRAMES_RECEIVED_TOTAL, &[]);

    let enabled = state
        .sessions
        .update_existing(id, |s| s.emotion_detection_enabled)
        .await
        .unwrap_or(false);
    if !enabled {
        state.count(names::FRAMES_DROPPED_TOTAL, &[("reason", "detection_disabled")]);
        return None;
    }

    let emotion = state.pipeline.process_frame(image).await?;
    // The connection may have closed during inference.
    state
        .sessions
        .update_existing(id, |s| s.current_emotion = emotion)
        .await?;
    state.count(names::EMOTIONS_DETECTED_TOTAL, &[("emotion", emotion.label())]);
    debug!(connection_id = %id, %emotion, "emotion detected");
    Some(ServerEvent::EmotionDetected { emotion })
}

pub async fn handle_chat(state: &HandlerState, id: &ConnectionId, message: &str) -> ServerEvent {
    state.count(names::CHAT_MESSAGES_TOTAL, &[]);
    let emotion = state.sessions.update(id, |s| s.current_emotion).await;
    let reply = state.responder.respond(id, message, emotion).await;
    ServerEvent::ChatResponse { message: reply }
}
