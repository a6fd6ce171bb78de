use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use moodchat_core::{ClientEvent, ConnectionId, ServerEvent};
use moodchat_telemetry::names;

use crate::client::{ClientRegistry, HEARTBEAT_INTERVAL};
use crate::handlers::{self, HandlerState, INVALID_EVENT};

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Outbound messages buffered per client before new ones are dropped.
    pub max_send_queue: usize,
    /// Inbound events buffered per client ahead of its worker.
    pub max_pending_events: usize,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            max_send_queue: 256,
            max_pending_events: 32,
            allowed_origins: vec!["*".into()],
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub handlers: Arc<HandlerState>,
    pub clients: Arc<ClientRegistry>,
    pub max_pending_events: usize,
    pub shutdown: CancellationToken,
}

pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Bind and serve. Port 0 picks a free port.
pub async fn start(config: ServerConfig, handlers: HandlerState) -> Result<ServerHandle, std::io::Error> {
    let shutdown = CancellationToken::new();
    let state = AppState {
        handlers: Arc::new(handlers),
        clients: Arc::new(ClientRegistry::new(config.max_send_queue)),
        max_pending_events: config.max_pending_events.max(1),
        shutdown: shutdown.clone(),
    };
    let router = build_router(state, &config.allowed_origins);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "moodchat server started");

    let token = shutdown.clone();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await;
        if let Err(e) = result {
            warn!(error = %e, "server exited with error");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        shutdown,
        server,
    })
}

/// Handle returned by [`start`]. Dropping it leaves the server running.
pub struct ServerHandle {
    pub port: u16,
    shutdown: CancellationToken,
    server: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Close open sockets and wait for the listener to stop.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.server.await {
            warn!(error = %e, "server task failed");
        }
        info!("moodchat server stopped");
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "sessions": state.handlers.sessions.len(),
        "uptime_secs": state.handlers.uptime_secs(),
    }))
}

/// In-process metrics snapshot; 404 when metrics are disabled.
async fn metrics_handler(State(state): State<AppState>) -> axum::response::Response {
    match &state.handlers.metrics {
        Some(m) => Json(m.snapshot()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Per-connection lifecycle: writer, reader and a sequential event worker.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (id, mut outbound) = state.clients.register();
    let shared = Arc::clone(&state.handlers);
    shared.count(names::WS_CONNECTIONS_TOTAL, &[]);
    gauge_add(&shared, 1.0);
    // Fresh session per connection.
    shared.sessions.get_or_create(&id);
    info!(connection_id = %id, "client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (event_tx, mut event_rx) = mpsc::channel::<ClientEvent>(state.max_pending_events);

    let writer_id = id.clone();
    let mut writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(HEARTBEAT_INTERVAL);
        ping.tick().await;
        loop {
            tokio::select! {
                msg = outbound.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if ws_tx.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                    tracing::trace!(connection_id = %writer_id, "sent ping");
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    let worker_state = Arc::clone(&shared);
    let worker_clients = Arc::clone(&state.clients);
    let worker_id = id.clone();
    let mut worker = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let reply = handlers::handle_event(Arc::clone(&worker_state), worker_id.clone(), event).await;
            if let Some(reply) = reply {
                send_event(&worker_clients, &worker_id, &reply);
            }
        }
    });

    let reader_state = Arc::clone(&shared);
    let reader_clients = Arc::clone(&state.clients);
    let reader_id = id.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            let text = match msg {
                WsMessage::Text(text) => text,
                WsMessage::Close(_) => break,
                _ => continue,
            };
            let event = match serde_json::from_str::<ClientEvent>(text.as_str()) {
                Ok(event) => event,
                Err(e) => {
                    debug!(connection_id = %reader_id, error = %e, "malformed event");
                    send_event(&reader_clients, &reader_id, &ServerEvent::error(INVALID_EVENT));
                    continue;
                }
            };
            match event {
                // Frames are lossy; a busy worker sheds them.
                ClientEvent::ProcessFrame { .. } => {
                    if event_tx.try_send(event).is_err() {
                        reader_state.count(names::FRAMES_DROPPED_TOTAL, &[("reason", "queue_full")]);
                    }
                }
                ClientEvent::ChatMessage { .. } => {
                    if event_tx.send(event).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    tokio::select! {
        _ = &mut writer => {},
        _ = &mut reader => {},
        _ = &mut worker => {},
        _ = state.shutdown.cancelled() => {},
    }
    reader.abort();
    worker.abort();
    writer.abort();

    state.clients.unregister(&id);
    shared.sessions.remove(&id);
    gauge_add(&shared, -1.0);
    info!(connection_id = %id, "client disconnected");
}

fn send_event(clients: &ClientRegistry, id: &ConnectionId, event: &ServerEvent) {
    match event.to_json() {
        Ok(json) => {
            clients.send_to(id, json);
        }
        Err(e) => warn!(connection_id = %id, error = %e, "failed to encode event"),
    }
}

fn gauge_add(handlers: &HandlerState, delta: f64) {
    if let Some(m) = &handlers.metrics {
        m.gauge_inc(names::WS_CONNECTIONS_ACTIVE, &[], delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moodchat_engine::{SessionConfig, SessionStore};
    use moodchat_llm::MockBackend;
    use moodchat_telemetry::MetricsRecorder;
    use moodchat_vision::mock::{StaticClassifier, StaticLocator};
    use moodchat_vision::{DetectorParams, FramePipeline};

    fn handler_state() -> HandlerState {
        let sessions = Arc::new(SessionStore::new(SessionConfig::default()).unwrap());
        let pipeline = FramePipeline::new(
            Arc::new(StaticLocator::empty()),
            Arc::new(StaticClassifier::new(vec![])),
            DetectorParams::default(),
        );
        HandlerState::new(sessions, Arc::new(MockBackend::new(vec![])), pipeline, None)
    }

    #[test]
    fn cors_layer_variants() {
        let _ = cors_layer(&["*".into()]);
        let _ = cors_layer(&[]);
        let _ = cors_layer(&["http://localhost:3000".into(), "bad\norigin".into()]);
    }

    #[tokio::test]
    async fn serves_health_on_ephemeral_port() {
        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        let handle = start(config, handler_state()).await.unwrap();
        assert!(handle.port > 0);

        let url = format!("http://127.0.0.1:{}/health", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["sessions"], 0);
        assert!(body["uptime_secs"].is_u64());

        let resp = reqwest::get(format!("http://127.0.0.1:{}/metrics", handle.port))
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn metrics_snapshot_is_served() {
        let metrics = Arc::new(MetricsRecorder::new(16));
        metrics.counter_inc(names::CHAT_MESSAGES_TOTAL, &[], 2);
        let mut state = handler_state();
        state.metrics = Some(metrics);

        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        let handle = start(config, state).await.unwrap();
        let body: serde_json::Value = reqwest::get(format!("http://127.0.0.1:{}/metrics", handle.port))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["counters"]["chat_messages_total"], 2);
        handle.shutdown().await;
    }
}
