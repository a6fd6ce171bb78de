use async_trait::async_trait;

use moodchat_core::backend::ChatBackend;
use moodchat_core::errors::BackendError;
use moodchat_core::messages::ChatTurn;

/// Stands in when no backend credentials are configured.
///
/// Every call fails, which routes chat through the canned replies.
pub struct UnavailableBackend {
    reason: String,
}

impl UnavailableBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ChatBackend for UnavailableBackend {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn model(&self) -> &str {
        "none"
    }

    async fn complete(&self, _history: &[ChatTurn], _message: &str) -> Result<String, BackendError> {
        Err(BackendError::Unavailable(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_fails_with_reason() {
        let backend = UnavailableBackend::new("GEMINI_API_KEY not set");
        let err = backend.complete(&[], "hi").await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }
}
