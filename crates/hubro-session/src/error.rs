//! Session and transport error types.

use hubro_config::ConfigError;
use hubro_protocol::ProtocolError;
use tokio_tungstenite::tungstenite;

/// Failure of the underlying connection.
///
/// Transport errors close the channel and drive the reconnect path. They are
/// never returned from a send.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// WebSocket handshake or stream failure.
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),
    /// The endpoint refused the connection.
    #[error("Connection refused: {0}")]
    Refused(String),
}

impl From<tungstenite::Error> for TransportError {
    fn from(err: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

/// Error returned by session and channel operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Message sent while the channel is not open. The message is dropped.
    #[error("Session channel is not open")]
    ChannelClosed,
    /// Outbound message could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// Endpoint could not be derived from configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The session event loop has stopped.
    #[error("Session has shut down")]
    Shutdown,
}
