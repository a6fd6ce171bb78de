use async_trait::async_trait;

use crate::errors::BackendError;
use crate::messages::ChatTurn;

/// A conversational text generator.
///
/// `history` is the context window already trimmed by the caller; `message`
/// is the new user turn. Implementations return the generated reply text.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    async fn complete(&self, history: &[ChatTurn], message: &str) -> Result<String, BackendError>;
}
