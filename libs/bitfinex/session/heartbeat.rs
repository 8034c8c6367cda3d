//! Liveness watchdog
//!
//! ```text
//! every interval:
//!   idle > threshold ──> reconnect (inline, one at a time)
//!   otherwise        ──> ping (answered by a pong event)
//! ```
//!
//! Runs on its own thread and holds only a weak reference to the session,
//! so a dropped session ends the loop on the next tick. `stop()` joins.

use crate::error::SessionError;
use crossbeam_channel::{select, Sender};
use std::sync::Weak;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What the monitor needs from the session
pub trait HeartbeatTarget: Send + Sync {
    /// Session is in a state where a ping makes sense
    fn is_ready(&self) -> bool;

    fn idle_for(&self) -> Duration;

    fn send_ping(&self);

    fn reconnect(&self) -> Result<(), SessionError>;
}

pub struct HeartbeatMonitor {
    shutdown_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl HeartbeatMonitor {
    pub fn start<T>(interval: Duration, threshold: Duration, target: Weak<T>) -> std::io::Result<Self>
    where
        T: HeartbeatTarget + 'static,
    {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);

        let handle = std::thread::Builder::new()
            .name("bitfinex-heartbeat".to_string())
            .spawn(move || {
                let ticker = crossbeam_channel::tick(interval);
                debug!(
                    "[Heartbeat] Started (interval {:?}, threshold {:?})",
                    interval, threshold
                );

                loop {
                    select! {
                        recv(shutdown_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            let Some(target) = target.upgrade() else {
                                debug!("[Heartbeat] Session dropped");
                                break;
                            };
                            check(target.as_ref(), threshold);
                        }
                    }
                }

                debug!("[Heartbeat] Stopped");
            })?;

        Ok(Self {
            shutdown_tx,
            handle: Some(handle),
        })
    }

    /// Stop the loop and wait for the thread to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.shutdown_tx.try_send(());

        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == std::thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                error!("[Heartbeat] Monitor thread panicked");
            }
        }
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn check<T: HeartbeatTarget + ?Sized>(target: &T, threshold: Duration) {
    let idle = target.idle_for();

    if idle > threshold {
        warn!(
            "[Heartbeat] No activity for {:?} (threshold {:?}), reconnecting",
            idle, threshold
        );
        match target.reconnect() {
            Ok(()) => info!("[Heartbeat] Reconnect succeeded"),
            Err(SessionError::ReconnectInProgress) => {
                debug!("[Heartbeat] Reconnect already running elsewhere")
            }
            Err(e) => error!("[Heartbeat] Reconnect failed, retrying on next tick: {}", e),
        }
        return;
    }

    if target.is_ready() {
        target.send_ping();
    }
}
