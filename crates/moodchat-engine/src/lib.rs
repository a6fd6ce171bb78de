//! Per-connection session state, command dispatch and reply generation.

pub mod commands;
pub mod error;
pub mod fallback;
pub mod history;
pub mod prompts;
pub mod responder;
pub mod session;

pub use commands::{Command, CommandDispatcher, Dispatch};
pub use error::EngineError;
pub use history::HistoryBuffer;
pub use responder::ResponseGenerator;
pub use session::{Session, SessionConfig, SessionHandle, SessionStore};
