//! # HyperSockets
//!
//! A small duplex text transport over WebSocket, built for session controllers
//! that want to drive a socket from plain threads.
//!
//! ## Features
//!
//! - **Blocking surface**: `open`, `send`, `close` can be called from any thread
//! - **Owned I/O runtime**: socket I/O runs on a private tokio runtime
//! - **Dedicated dispatch thread**: inbound text is delivered to consumers in order,
//!   off the I/O task, through an unbounded crossbeam channel
//! - **Reopenable**: a closed transport can be opened again on the same instance

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core transport functionality
pub use core::{
    client, config, connection_state, consumers,
    client::WebSocketTransport,
    config::TransportConfig,
    connection_state::{AtomicConnectionState, ConnectionState},
    consumers::ConsumerSet,
};

/// Type alias for Result with HyperSocketError
pub type Result<T> = std::result::Result<T, traits::HyperSocketError>;
