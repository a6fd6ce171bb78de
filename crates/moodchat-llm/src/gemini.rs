//! Gemini `generateContent` backend.
//!
//! One non-streaming request per turn. The API key travels in the
//! `x-goog-api-key` header and is never placed in the URL or logs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use moodchat_core::backend::ChatBackend;
use moodchat_core::errors::BackendError;
use moodchat_core::messages::ChatTurn;

use crate::models;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
    pub temperature: Option<f64>,
}

impl GeminiConfig {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: None,
        }
    }

    /// Reads the key from `GEMINI_API_KEY`. Returns `None` when unset or blank.
    pub fn from_env(model: impl Into<String>) -> Option<Self> {
        let key = std::env::var(API_KEY_ENV).ok()?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some(Self::new(SecretString::from(key.to_owned()), model))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeminiContent {
    pub role: String,
    pub parts: Vec<GeminiPart>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeminiPart {
    #[serde(default)]
    pub text: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<GeminiContent>,
    pub generation_config: GenerationConfig,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    pub content: Option<GeminiContent>,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| BackendError::Unavailable(format!("http client: {e}")))?;
        Ok(Self { client, config })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    pub fn build_request_body(&self, history: &[ChatTurn], message: &str) -> GenerateContentRequest {
        let mut contents: Vec<GeminiContent> = history
            .iter()
            .map(|turn| GeminiContent {
                role: turn.role.as_str().to_string(),
                parts: vec![GeminiPart {
                    text: turn.text.clone(),
                }],
            })
            .collect();
        contents.push(GeminiContent {
            role: "user".into(),
            parts: vec![GeminiPart {
                text: message.to_string(),
            }],
        });

        GenerateContentRequest {
            contents,
            generation_config: GenerationConfig {
                max_output_tokens: models::max_output_for(&self.config.model),
                temperature: self.config.temperature,
            },
        }
    }
}

/// Join the text parts of the first candidate.
pub fn extract_text(response: &GenerateContentResponse) -> Result<String, BackendError> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(BackendError::InvalidResponse(format!("prompt blocked: {reason}")));
    }

    let candidate = response
        .candidates
        .first()
        .ok_or_else(|| BackendError::InvalidResponse("no candidates".into()))?;

    let text: String = candidate
        .content
        .as_ref()
        .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
        return Err(BackendError::InvalidResponse(format!(
            "empty candidate (finish reason: {reason})"
        )));
    }
    Ok(text)
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip(self, history, message), fields(model = %self.config.model, history_len = history.len()))]
    async fn complete(&self, history: &[ChatTurn], message: &str) -> Result<String, BackendError> {
        let body = self.build_request_body(history, message);

        let resp = self
            .client
            .post(self.api_url())
            .header("x-goog-api-key", self.config.api_key.expose_secret())
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::NetworkError(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status, body));
        }

        let parsed: GenerateContentResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        let text = extract_text(&parsed)?;
        debug!(reply_len = text.len(), "gemini reply received");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> GeminiConfig {
        GeminiConfig::new(SecretString::from("AIza-test-key".to_string()), "gemini-2.0-flash")
            .with_base_url(base_url)
    }

    fn reply_json(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }]
        })
    }

    #[test]
    fn api_url_uses_model_and_trims_slash() {
        let backend = GeminiBackend::new(test_config("http://localhost:1/v1beta/")).unwrap();
        assert_eq!(
            backend.api_url(),
            "http://localhost:1/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert!(!backend.api_url().contains("AIza"));
    }

    #[test]
    fn request_body_appends_message_after_history() {
        let backend = GeminiBackend::new(test_config(DEFAULT_BASE_URL)).unwrap();
        let history = vec![ChatTurn::user("context"), ChatTurn::model("hi there")];
        let body = serde_json::to_value(backend.build_request_body(&history, "how are you?")).unwrap();

        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["text"], "hi there");
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(contents[2]["parts"][0]["text"], "how are you?");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
        assert!(body["generationConfig"].get("temperature").is_none());
    }

    #[test]
    fn config_debug_redacts_key() {
        let rendered = format!("{:?}", test_config(DEFAULT_BASE_URL));
        assert!(!rendered.contains("AIza-test-key"));
    }

    #[test]
    fn extract_joins_parts() {
        let resp: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Hello"}, {"text": ", friend"}]}}]
        }))
        .unwrap();
        assert_eq!(extract_text(&resp).unwrap(), "Hello, friend");
    }

    #[test]
    fn extract_rejects_blocked_and_empty() {
        let blocked: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        assert!(matches!(extract_text(&blocked), Err(BackendError::InvalidResponse(m)) if m.contains("SAFETY")));

        let none = GenerateContentResponse::default();
        assert!(matches!(extract_text(&none), Err(BackendError::InvalidResponse(_))));

        let empty: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"finishReason": "MAX_TOKENS"}]
        }))
        .unwrap();
        assert!(matches!(extract_text(&empty), Err(BackendError::InvalidResponse(m)) if m.contains("MAX_TOKENS")));
    }

    #[tokio::test]
    async fn complete_sends_key_header_and_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "AIza-test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_json("I'm here for you.")))
            .expect(1)
            .mount(&server)
            .await;

        let backend = GeminiBackend::new(test_config(&server.uri())).unwrap();
        let reply = backend.complete(&[], "hello").await.unwrap();
        assert_eq!(reply, "I'm here for you.");
    }

    #[tokio::test]
    async fn unauthorized_maps_to_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let backend = GeminiBackend::new(test_config(&server.uri())).unwrap();
        let err = backend.complete(&[], "hello").await.unwrap_err();
        assert!(matches!(err, BackendError::AuthenticationFailed(ref b) if b.contains("not valid")));
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let backend = GeminiBackend::new(test_config(&server.uri())).unwrap();
        let err = backend.complete(&[], "hello").await.unwrap_err();
        assert!(matches!(err, BackendError::ServerError { status: 503, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn garbage_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let backend = GeminiBackend::new(test_config(&server.uri())).unwrap();
        let err = backend.complete(&[], "hello").await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn connection_refused_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let backend = GeminiBackend::new(test_config(&format!("http://127.0.0.1:{port}"))).unwrap();
        let err = backend.complete(&[], "hello").await.unwrap_err();
        assert!(matches!(err, BackendError::NetworkError(_)));
    }
}
