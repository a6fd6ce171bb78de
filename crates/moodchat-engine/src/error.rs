#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid session config: {0}")]
    InvalidConfig(String),
}
