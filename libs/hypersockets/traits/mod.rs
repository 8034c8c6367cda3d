//! # HyperSockets Traits
//!
//! Core traits and types shared by transport implementations:
//!
//! - **Transport**: duplex text channel with inbound consumer registration
//! - **HyperSocketError**: error type for every transport operation

pub mod error;
pub mod transport;

// Re-export commonly used types
pub use error::{HyperSocketError, Result};
pub use transport::{ConsumerId, InboundConsumer, Transport};
