//! Duplex text transport abstraction
//!
//! ```text
//!            send(text)                      inbound text
//! Caller ─────────────> Transport ─────> Consumer 1, Consumer 2, ...
//!                          │               (called in arrival order,
//!                     open / close          on the dispatch thread)
//! ```
//!
//! A transport is reliable once connected but may silently stop delivering
//! data. Liveness detection is the caller's job.

use crate::error::Result;
use std::sync::Arc;

/// Callback receiving every inbound text frame
///
/// Consumers run on the transport's dispatch thread. They must not block
/// for unbounded time and must not call [`Transport::close`] on the transport
/// that is currently delivering to them.
pub type InboundConsumer = Arc<dyn Fn(&str) + Send + Sync>;

/// Handle returned by [`Transport::add_consumer`], used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerId(pub u64);

/// Duplex text-message channel
///
/// All methods are blocking and safe to call from any non-async thread.
pub trait Transport: Send + Sync {
    /// Open the connection to `url`
    ///
    /// Fails with `InvalidState` if the transport is already open.
    fn open(&self, url: &str) -> Result<()>;

    /// Queue a text frame for sending
    fn send(&self, text: &str) -> Result<()>;

    /// Close the connection. Closing a closed transport is a no-op.
    fn close(&self);

    /// Check whether the connection is currently open
    fn is_open(&self) -> bool;

    /// Register a consumer for inbound text frames
    ///
    /// Consumers stay registered across close/open cycles.
    fn add_consumer(&self, consumer: InboundConsumer) -> ConsumerId;

    /// Unregister a consumer, returning whether it was registered
    fn remove_consumer(&self, id: ConsumerId) -> bool;
}
