//! Session lifecycle
//!
//! ```text
//! Disconnected ──> Connecting ──> AuthHandshake ──> Ready ──> Disconnected
//!                      ^                              │
//!                      └──────── Reconnecting <───────┘
//! ```

pub mod context;
pub mod controller;
pub mod heartbeat;
pub mod readiness;
pub mod state;

pub use context::SessionContext;
pub use controller::{BitfinexSession, BitfinexSessionBuilder};
pub use heartbeat::{HeartbeatMonitor, HeartbeatTarget};
pub use readiness::{ReadinessBarrier, ReadinessOutcome};
pub use state::{SessionPhase, SessionState};
