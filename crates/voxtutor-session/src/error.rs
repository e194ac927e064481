use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("WebSocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Session closed")]
    Closed,
}
