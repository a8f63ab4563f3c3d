use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("identifier must not be empty")]
    EmptyIdentifier,

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
