pub mod gemini;
pub mod guarded;
pub mod models;
pub mod unavailable;

pub mod mock;

pub use gemini::{GeminiBackend, GeminiConfig};
pub use guarded::{GuardConfig, GuardedBackend};
pub use mock::{MockBackend, MockReply};
pub use unavailable::UnavailableBackend;
