//! Bitfinex websocket session
//!
//! A long-lived, authenticated session over one websocket: channel
//! subscriptions, frame routing, liveness tracking and transparent
//! reconnect with resubscription.
//!
//! # Example
//!
//! ```no_run
//! use bitfinex::{BitfinexSession, Credentials, CurrencyPair, SessionConfig, StreamSymbol};
//!
//! # fn main() -> Result<(), bitfinex::SessionError> {
//! let session = BitfinexSession::builder()
//!     .config(SessionConfig::default())
//!     .credentials(Credentials::from_env())
//!     .build()?;
//!
//! session.connect()?;
//! session.subscribe(&StreamSymbol::Ticker(CurrencyPair::new("BTC", "USD")))?;
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod managers;
pub mod registry;
pub mod router;
pub mod session;
pub mod symbols;

pub use commands::{ApiCommand, CommandError, Credentials, ExchangeOrder, OrderType};
pub use config::{ConfigError, ResubscribePolicy, SessionConfig};
pub use error::{Result, SessionError};
pub use registry::{ChannelBinding, ChannelRegistry, PendingSubscriptionSet};
pub use router::{ApiHandler, ChannelHandler, FrameRouter, HandlerError, StreamHandlers};
pub use session::{BitfinexSession, BitfinexSessionBuilder, SessionPhase};
pub use symbols::{
    CandlestickSymbol, CurrencyPair, OrderbookConfiguration, OrderbookFrequency,
    OrderbookPrecision, StreamKind, StreamSymbol, Timeframe,
};
