//! Graceful shutdown management

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Manages graceful shutdown for long-running processes
pub struct ShutdownManager {
    flag: Arc<AtomicBool>,
}

impl ShutdownManager {
    /// Create a new shutdown manager with running state
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Spawn a Ctrl+C signal handler that triggers shutdown
    ///
    /// The session API is blocking, so the handler gets its own thread and
    /// a single-threaded runtime.
    pub fn spawn_signal_handler(&self) {
        let flag = Arc::clone(&self.flag);
        let spawned = std::thread::Builder::new()
            .name("signal-handler".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Unable to start signal handler runtime: {}", e);
                        return;
                    }
                };

                if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
                    info!("");
                    info!("Received shutdown signal (Ctrl+C)");
                    info!("Shutting down gracefully...");
                    flag.store(false, Ordering::Release);
                }
            });

        if let Err(e) = spawned {
            error!("Unable to spawn signal handler: {}", e);
        }
    }

    /// Check if the process should continue running
    pub fn is_running(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Trigger shutdown programmatically
    pub fn trigger(&self) {
        self.flag.store(false, Ordering::Release);
    }

    /// Sleep for a duration, but wake early if shutdown is triggered
    pub fn interruptible_sleep(&self, duration: Duration) {
        let check_interval = Duration::from_millis(50);
        let mut elapsed = Duration::ZERO;

        while elapsed < duration && self.is_running() {
            std::thread::sleep(check_interval);
            elapsed += check_interval;
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}
