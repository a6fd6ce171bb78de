//! Metric names recorded across the workspace.

pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
pub const FRAMES_RECEIVED_TOTAL: &str = "frames_received_total";
pub const FRAMES_DROPPED_TOTAL: &str = "frames_dropped_total";
pub const EMOTIONS_DETECTED_TOTAL: &str = "emotions_detected_total";
pub const CHAT_MESSAGES_TOTAL: &str = "chat_messages_total";
pub const BACKEND_FAILURES_TOTAL: &str = "backend_failures_total";
pub const FALLBACK_RESPONSES_TOTAL: &str = "fallback_responses_total";
pub const BACKEND_LATENCY_MS: &str = "backend_latency_ms";

pub const ALL: &[&str] = &[
    WS_CONNECTIONS_TOTAL,
    WS_CONNECTIONS_ACTIVE,
    FRAMES_RECEIVED_TOTAL,
    FRAMES_DROPPED_TOTAL,
    EMOTIONS_DETECTED_TOTAL,
    CHAT_MESSAGES_TOTAL,
    BACKEND_FAILURES_TOTAL,
    FALLBACK_RESPONSES_TOTAL,
    BACKEND_LATENCY_MS,
];
