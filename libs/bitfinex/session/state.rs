//! Session state shared between the receive path and the controller
//!
//! Plain atomics: the flags are only ever read or replaced whole, and the
//! activity timestamp is best-effort (staleness is measured in tens of
//! seconds).

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

/// Lifecycle phase of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionPhase {
    Disconnected = 0,
    Connecting = 1,
    AuthHandshake = 2,
    Ready = 3,
    Reconnecting = 4,
}

impl SessionPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionPhase::Connecting,
            2 => SessionPhase::AuthHandshake,
            3 => SessionPhase::Ready,
            4 => SessionPhase::Reconnecting,
            _ => SessionPhase::Disconnected,
        }
    }
}

pub struct SessionState {
    phase: AtomicU8,
    authenticated: AtomicBool,
    /// Reference point for `last_activity_ms`
    epoch: Instant,
    last_activity_ms: AtomicU64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(SessionPhase::Disconnected as u8),
            authenticated: AtomicBool::new(false),
            epoch: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        SessionPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn set_phase(&self, phase: SessionPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    /// Transport is up (any phase past `Disconnected`)
    pub fn is_connected(&self) -> bool {
        self.phase() != SessionPhase::Disconnected
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.store(authenticated, Ordering::Release);
    }

    pub fn mark_activity(&self) {
        let ms = self.epoch.elapsed().as_millis() as u64;
        self.last_activity_ms.store(ms, Ordering::Release);
    }

    /// Time since the last inbound frame or pong
    pub fn idle_for(&self) -> Duration {
        let last = self.last_activity_ms.load(Ordering::Acquire);
        let now = self.epoch.elapsed().as_millis() as u64;
        Duration::from_millis(now.saturating_sub(last))
    }

    pub fn is_stale(&self, threshold: Duration) -> bool {
        self.idle_for() > threshold
    }
}
