pub mod backend;
pub mod emotion;
pub mod errors;
pub mod events;
pub mod ids;
pub mod messages;

pub use backend::ChatBackend;
pub use emotion::Emotion;
pub use errors::BackendError;
pub use events::{ClientEvent, ServerEvent};
pub use ids::ConnectionId;
pub use messages::{ChatTurn, Role};
