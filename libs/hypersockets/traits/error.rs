use thiserror::Error;

/// Errors returned by transport operations
#[derive(Error, Debug)]
pub enum HyperSocketError {
    /// WebSocket connection error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Operation requires an open connection
    #[error("Not connected")]
    NotConnected,

    /// Channel send error
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Invalid state transition
    #[error("Invalid state transition: {0}")]
    InvalidState(String),
}

/// Result type for hypersockets operations
pub type Result<T> = std::result::Result<T, HyperSocketError>;
