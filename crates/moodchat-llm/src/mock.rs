use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use moodchat_core::backend::ChatBackend;
use moodchat_core::errors::BackendError;
use moodchat_core::messages::ChatTurn;

/// Pre-programmed replies for deterministic testing without API calls.
#[derive(Clone, Debug)]
pub enum MockReply {
    Text(String),
    Error(BackendError),
    /// Wait a duration, then yield the inner reply.
    Delay(Duration, Box<MockReply>),
}

impl MockReply {
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }

    pub fn delayed(delay: Duration, inner: MockReply) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// A call the mock received.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub history: Vec<ChatTurn>,
    pub message: String,
}

/// Mock backend that returns scripted replies in order.
///
/// Once the script runs out, the `repeat` reply is used if set; otherwise
/// calls fail with `InvalidRequest`.
pub struct MockBackend {
    script: Mutex<VecDeque<MockReply>>,
    repeat: Option<MockReply>,
    calls: Mutex<Vec<RecordedCall>>,
    call_count: AtomicUsize,
}

impl MockBackend {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            repeat: None,
            calls: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Every call gets the same reply.
    pub fn repeating(reply: MockReply) -> Self {
        Self {
            repeat: Some(reply),
            ..Self::new(Vec::new())
        }
    }

    pub fn failing(error: BackendError) -> Self {
        Self::repeating(MockReply::Error(error))
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls.lock().last().cloned()
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, history: &[ChatTurn], message: &str) -> Result<String, BackendError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.calls.lock().push(RecordedCall {
            history: history.to_vec(),
            message: message.to_string(),
        });

        let next = self.script.lock().pop_front().or_else(|| self.repeat.clone());
        let Some(mut reply) = next else {
            return Err(BackendError::InvalidRequest(format!(
                "MockBackend: no reply configured for call {idx}"
            )));
        };

        loop {
            match reply {
                MockReply::Text(text) => return Ok(text),
                MockReply::Error(e) => return Err(e),
                MockReply::Delay(d, inner) => {
                    tokio::time::sleep(d).await;
                    reply = *inner;
                }
            }
        }
    }
}
