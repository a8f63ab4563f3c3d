use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    #[error("stomp handshake failed: {0}")]
    Handshake(String),

    #[error("broker rejected the connection: {0}")]
    Rejected(String),

    #[error("dial refused: {0}")]
    Refused(String),

    #[error("event bus is not connected")]
    NotConnected,

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("link closed")]
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for BusError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        BusError::WebSocket(Box::new(e))
    }
}
