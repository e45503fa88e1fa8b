//! Client error type.

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connecting or talking to the relay failed.
    #[error("websocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("frame codec error: {0}")]
    Codec(#[from] frames::CodecError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// The relay could not be reached within the attempt budget.
    #[error("gave up after {attempts} reconnect attempts")]
    ReconnectExhausted { attempts: u32 },
    /// The driver task is gone.
    #[error("session closed")]
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}
