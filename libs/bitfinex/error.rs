use crate::commands::CommandError;
use crate::config::ConfigError;
use hypersockets::HyperSocketError;
use thiserror::Error;

/// Errors surfaced by the session controller
///
/// Only failures tied to an explicit call end up here. Receive-path problems
/// (malformed frames, unknown tags, unresolved channels) are logged and dropped.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Transport open/send/close failure
    #[error("Transport error: {0}")]
    Transport(#[from] HyperSocketError),

    /// Server rejected the authentication request
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Readiness events did not all arrive in time
    #[error("Connection not ready after {timeout_secs}s ({missing} readiness events missing)")]
    AuthenticationTimeout { timeout_secs: u64, missing: usize },

    /// A blocking wait was interrupted by close()
    #[error("Operation cancelled: session closed")]
    Cancelled,

    /// Resubscription did not complete within the retry budget
    #[error("Resubscription failed: {confirmed} of {expected} channels confirmed")]
    ResubscribeFailed { expected: usize, confirmed: usize },

    /// Another reconnect is already running
    #[error("Reconnect already in progress")]
    ReconnectInProgress,

    /// Authenticated-only operation on an unauthenticated session
    #[error("Unable to perform operation on an unauthenticated connection")]
    Unauthenticated,

    /// Operation requires connect() first
    #[error("Session is not connected")]
    NotConnected,

    /// Command could not be encoded
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
