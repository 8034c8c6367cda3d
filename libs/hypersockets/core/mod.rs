//! # HyperSockets Core
//!
//! WebSocket implementation of the [`Transport`](crate::traits::Transport) trait.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hypersockets::{Transport, TransportConfig, WebSocketTransport};
//! use std::sync::Arc;
//!
//! fn main() -> hypersockets::Result<()> {
//!     let transport = WebSocketTransport::new(TransportConfig::default())?;
//!     transport.add_consumer(Arc::new(|text: &str| println!("<- {}", text)));
//!
//!     transport.open("wss://api.example.com/ws")?;
//!     transport.send(r#"{"event":"ping"}"#)?;
//!
//!     transport.close();
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection_state;
pub mod consumers;

// Re-export main types
pub use client::WebSocketTransport;
pub use config::TransportConfig;
pub use connection_state::{AtomicConnectionState, ConnectionState};
pub use consumers::ConsumerSet;

// Re-export traits for convenience
pub use crate::traits::*;
