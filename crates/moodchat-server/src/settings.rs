//! Layered settings: compiled defaults, then `~/.moodchat/settings.json`,
//! then `MOODCHAT_*` environment variables.
//!
//! File values are deep-merged over the defaults. Objects merge per key,
//! arrays and primitives are replaced, and nulls are skipped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use moodchat_engine::SessionConfig;
use moodchat_llm::GuardConfig;
use moodchat_vision::DetectorParams;

use crate::error::{Result, SettingsError};
use crate::server::ServerConfig;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanionSettings {
    pub server: ServerSettings,
    pub backend: BackendSettings,
    pub vision: VisionSettings,
    pub session: SessionSettings,
    pub logging: LoggingSettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub max_send_queue: usize,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            max_send_queue: 256,
            allowed_origins: vec!["*".into()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendSettings {
    pub model: String,
    pub base_url: String,
    pub timeout_ms: u64,
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            model: moodchat_llm::models::GEMINI_2_0_FLASH.into(),
            base_url: moodchat_llm::gemini::DEFAULT_BASE_URL.into(),
            timeout_ms: 20_000,
            failure_threshold: 3,
            cooldown_secs: 60,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisionSettings {
    pub face_model_path: PathBuf,
    pub emotion_model_path: PathBuf,
    pub scale_factor: f32,
    pub min_neighbors: u32,
    pub intra_threads: usize,
}

impl Default for VisionSettings {
    fn default() -> Self {
        let params = DetectorParams::default();
        Self {
            face_model_path: PathBuf::from("models/face_detector.onnx"),
            emotion_model_path: PathBuf::from("models/emotion_model.onnx"),
            scale_factor: params.scale_factor,
            min_neighbors: params.min_neighbors,
            intra_threads: 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    pub history_cap: usize,
    pub context_window: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let c = SessionConfig::default();
        Self {
            history_cap: c.history_cap,
            context_window: c.context_window,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

impl CompanionSettings {
    pub fn validate(&self) -> Result<()> {
        if self.server.max_send_queue == 0 {
            return Err(SettingsError::InvalidValue("server.maxSendQueue must be > 0".into()));
        }
        if self.backend.timeout_ms == 0 {
            return Err(SettingsError::InvalidValue("backend.timeoutMs must be > 0".into()));
        }
        if self.vision.scale_factor.is_nan() || self.vision.scale_factor <= 1.0 {
            return Err(SettingsError::InvalidValue(format!(
                "vision.scaleFactor must be > 1, got {}",
                self.vision.scale_factor
            )));
        }
        self.log_level()?;
        self.session_config()
            .validate()
            .map_err(|e| SettingsError::InvalidValue(e.to_string()))
    }

    pub fn log_level(&self) -> Result<tracing::Level> {
        parse_log_level(&self.logging.level)
            .and_then(|level| level.parse().ok())
            .ok_or_else(|| {
                SettingsError::InvalidValue(format!(
                    "logging.level must be one of trace, debug, info, warn, error; got {:?}",
                    self.logging.level
                ))
            })
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            max_send_queue: self.server.max_send_queue,
            allowed_origins: self.server.allowed_origins.clone(),
            ..ServerConfig::default()
        }
    }

    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig {
            timeout: Duration::from_millis(self.backend.timeout_ms),
            failure_threshold: self.backend.failure_threshold,
            cooldown: Duration::from_secs(self.backend.cooldown_secs),
        }
    }

    pub fn detector_params(&self) -> DetectorParams {
        DetectorParams {
            scale_factor: self.vision.scale_factor,
            min_neighbors: self.vision.min_neighbors,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            history_cap: self.session.history_cap,
            context_window: self.session.context_window,
        }
    }
}

/// `~/.moodchat/settings.json`
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".moodchat").join("settings.json")
}

/// Load from `path`, then apply env overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<CompanionSettings> {
    let defaults = serde_json::to_value(CompanionSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: CompanionSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Invalid values are ignored with a warning.
pub fn apply_env_overrides(settings: &mut CompanionSettings) {
    if let Some(v) = read_env_string("MOODCHAT_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("MOODCHAT_PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = read_env_string("MOODCHAT_MODEL") {
        settings.backend.model = v;
    }
    if let Some(v) = read_env_u64("MOODCHAT_BACKEND_TIMEOUT_MS", 100, 600_000) {
        settings.backend.timeout_ms = v;
    }
    if let Some(v) = read_env_string("MOODCHAT_FACE_MODEL") {
        settings.vision.face_model_path = PathBuf::from(v);
    }
    if let Some(v) = read_env_string("MOODCHAT_EMOTION_MODEL") {
        settings.vision.emotion_model_path = PathBuf::from(v);
    }
    if let Some(v) = read_env_string("MOODCHAT_LOG_LEVEL") {
        match parse_log_level(&v) {
            Some(level) => settings.logging.level = level,
            None => warn!(key = "MOODCHAT_LOG_LEVEL", value = %v, "invalid log level env var, ignoring"),
        }
    }
}

pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Normalized tracing level name, or `None` if unrecognized.
pub fn parse_log_level(val: &str) -> Option<String> {
    let level = val.trim().to_ascii_lowercase();
    matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error").then_some(level)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_documented_values() {
        let s = CompanionSettings::default();
        assert_eq!(s.server.host, "127.0.0.1");
        assert_eq!(s.server.port, 5000);
        assert_eq!(s.server.allowed_origins, vec!["*".to_string()]);
        assert_eq!(s.backend.model, "gemini-2.0-flash");
        assert_eq!(s.backend.timeout_ms, 20_000);
        assert_eq!(s.vision.scale_factor, 1.3);
        assert_eq!(s.vision.min_neighbors, 5);
        assert_eq!(s.session.history_cap, 50);
        assert_eq!(s.session.context_window, 5);
        assert_eq!(s.logging.level, "info");
        assert!(s.validate().is_ok());
    }

    #[test]
    fn serializes_camel_case() {
        let v = serde_json::to_value(CompanionSettings::default()).unwrap();
        assert!(v["server"]["maxSendQueue"].is_number());
        assert!(v["backend"]["timeoutMs"].is_number());
        assert!(v["vision"]["faceModelPath"].is_string());
        assert!(v["session"]["historyCap"].is_number());
    }

    #[test]
    fn merge_nested_override() {
        let target = json!({"server": {"host": "127.0.0.1", "port": 5000}});
        let source = json!({"server": {"port": 8080}});
        let merged = deep_merge(target, source);
        assert_eq!(merged, json!({"server": {"host": "127.0.0.1", "port": 8080}}));
    }

    #[test]
    fn merge_null_preserves_target() {
        let merged = deep_merge(json!({"a": 1, "b": 2}), json!({"a": null, "b": 3}));
        assert_eq!(merged, json!({"a": 1, "b": 3}));
    }

    #[test]
    fn merge_array_replace() {
        let merged = deep_merge(json!({"o": ["*"]}), json!({"o": ["http://a", "http://b"]}));
        assert_eq!(merged, json!({"o": ["http://a", "http://b"]}));
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_settings_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(s.session, SessionSettings::default());
        assert_eq!(s.vision, VisionSettings::default());
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"session": {"historyCap": 20}, "vision": {"minNeighbors": 3, "scaleFactor": null}}"#,
        )
        .unwrap();

        let s = load_settings_from_path(&path).unwrap();
        assert_eq!(s.session.history_cap, 20);
        assert_eq!(s.session.context_window, 5);
        assert_eq!(s.vision.min_neighbors, 3);
        assert_eq!(s.vision.scale_factor, 1.3);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_settings_from_path(&path), Err(SettingsError::Json(_))));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut s = CompanionSettings::default();
        s.session.history_cap = 2;
        assert!(matches!(s.validate(), Err(SettingsError::InvalidValue(_))));

        let mut s = CompanionSettings::default();
        s.vision.scale_factor = 1.0;
        assert!(s.validate().is_err());

        let mut s = CompanionSettings::default();
        s.server.max_send_queue = 0;
        assert!(s.validate().is_err());

        let mut s = CompanionSettings::default();
        s.logging.level = "verbose".into();
        assert!(matches!(s.validate(), Err(SettingsError::InvalidValue(m)) if m.contains("logging.level")));
    }

    #[test]
    fn log_level_is_case_insensitive() {
        let mut s = CompanionSettings::default();
        assert_eq!(s.log_level().unwrap(), tracing::Level::INFO);
        s.logging.level = " WARN ".into();
        assert_eq!(s.log_level().unwrap(), tracing::Level::WARN);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn conversions_carry_values() {
        let mut s = CompanionSettings::default();
        s.backend.timeout_ms = 1500;
        s.backend.failure_threshold = 7;
        s.vision.min_neighbors = 2;
        s.server.port = 0;

        assert_eq!(s.guard_config().timeout, Duration::from_millis(1500));
        assert_eq!(s.guard_config().failure_threshold, 7);
        assert_eq!(s.detector_params().min_neighbors, 2);
        assert_eq!(s.server_config().port, 0);
        assert_eq!(s.session_config(), SessionConfig::default());
    }

    #[test]
    fn parse_helpers() {
        assert_eq!(parse_u16_range("8080", 1, 65535), Some(8080));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("70000", 1, 65535), None);
        assert_eq!(parse_u64_range(" 2500 ", 100, 600_000), Some(2500));
        assert_eq!(parse_u64_range("abc", 100, 600_000), None);
        assert_eq!(parse_log_level("DEBUG"), Some("debug".into()));
        assert_eq!(parse_log_level("verbose"), None);
    }
}
