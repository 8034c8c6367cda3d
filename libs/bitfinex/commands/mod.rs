//! Outbound command encoding
//!
//! Every request the session can send implements [`ApiCommand`]: a pure
//! transform from a typed request to one line of protocol text.

pub mod auth;
pub mod orders;
pub mod subscribe;

pub use auth::{AuthCommand, Credentials};
pub use orders::{
    CancelOrderCommand, CancelOrderGroupCommand, ExchangeOrder, OrderCommand, OrderType,
};
pub use subscribe::{
    subscribe_command, PingCommand, SubscribeCandlesCommand, SubscribeOrderbookCommand,
    SubscribeTickerCommand, UnsubscribeChannelCommand,
};

use std::fmt::Debug;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command requires API credentials")]
    MissingCredentials,

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Invalid command argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A request that can be encoded to protocol text
pub trait ApiCommand: Send + Sync + Debug {
    /// Encode the request
    ///
    /// `credentials` is `None` on a public session; commands that need to
    /// sign fail with [`CommandError::MissingCredentials`].
    fn encode(&self, credentials: Option<&Credentials>) -> Result<String, CommandError>;
}
