//! One-shot readiness gate for a (re)connect attempt

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// How a wait on the barrier ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessOutcome {
    Ready,
    /// Server rejected the attempt
    Failed(String),
    /// Session closed while waiting
    Cancelled,
    /// Deadline passed with `missing` events outstanding
    TimedOut { missing: usize },
}

#[derive(Debug)]
struct BarrierState {
    remaining: usize,
    failure: Option<String>,
    cancelled: bool,
}

/// Countdown released after a fixed number of required events
///
/// Events past zero are ignored. The first `fail` or `cancel` wins over any
/// later count-down.
#[derive(Debug)]
pub struct ReadinessBarrier {
    required: usize,
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl ReadinessBarrier {
    pub fn new(required: usize) -> Self {
        Self {
            required,
            state: Mutex::new(BarrierState {
                remaining: required,
                failure: None,
                cancelled: false,
            }),
            released: Condvar::new(),
        }
    }

    pub fn required(&self) -> usize {
        self.required
    }

    pub fn remaining(&self) -> usize {
        self.state.lock().remaining
    }

    pub fn count_down(&self) {
        let mut state = self.state.lock();
        if state.remaining > 0 {
            state.remaining -= 1;
            if state.remaining == 0 {
                self.released.notify_all();
            }
        }
    }

    pub fn fail(&self, reason: impl Into<String>) {
        let mut state = self.state.lock();
        if state.failure.is_none() {
            state.failure = Some(reason.into());
        }
        self.released.notify_all();
    }

    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.cancelled = true;
        self.released.notify_all();
    }

    pub fn wait(&self, timeout: Duration) -> ReadinessOutcome {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();

        loop {
            if state.cancelled {
                return ReadinessOutcome::Cancelled;
            }
            if let Some(reason) = &state.failure {
                return ReadinessOutcome::Failed(reason.clone());
            }
            if state.remaining == 0 {
                return ReadinessOutcome::Ready;
            }
            if self.released.wait_until(&mut state, deadline).timed_out() {
                return if state.remaining == 0 && state.failure.is_none() && !state.cancelled {
                    ReadinessOutcome::Ready
                } else {
                    ReadinessOutcome::TimedOut {
                        missing: state.remaining,
                    }
                };
            }
        }
    }
}
