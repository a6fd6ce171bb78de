//! WebSocket front end: connection lifecycle, event handlers, settings.

pub mod client;
pub mod error;
pub mod handlers;
pub mod server;
pub mod settings;

pub use error::SettingsError;
pub use handlers::HandlerState;
pub use server::{start, ServerConfig, ServerHandle};
pub use settings::{load_settings_from_path, settings_path, CompanionSettings};
