use super::readiness::ReadinessBarrier;
use super::state::SessionState;
use crate::managers::{
    OrderManager, OrderbookManager, PositionManager, QuoteManager, WalletManager, WorkerPool,
};
use crate::registry::ChannelRegistry;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Everything the receive path and the controller share
///
/// Handed to every frame handler. The transport itself is not in here: only
/// the controller may open or close it.
pub struct SessionContext {
    pub registry: ChannelRegistry,
    pub state: SessionState,
    pub pool: Arc<WorkerPool>,
    pub quotes: QuoteManager,
    pub orderbooks: OrderbookManager,
    pub orders: OrderManager,
    pub positions: PositionManager,
    pub wallets: WalletManager,
    readiness: Mutex<Option<Arc<ReadinessBarrier>>>,
    auth_failure: Mutex<Option<String>>,
    closing: AtomicBool,
}

impl SessionContext {
    pub fn new(worker_threads: usize) -> Self {
        let pool = Arc::new(WorkerPool::new(worker_threads));
        Self {
            registry: ChannelRegistry::new(),
            state: SessionState::new(),
            quotes: QuoteManager::new(Arc::clone(&pool)),
            orderbooks: OrderbookManager::new(Arc::clone(&pool)),
            orders: OrderManager::new(),
            positions: PositionManager::new(Arc::clone(&pool)),
            wallets: WalletManager::new(),
            pool,
            readiness: Mutex::new(None),
            auth_failure: Mutex::new(None),
            closing: AtomicBool::new(false),
        }
    }

    /// Install a fresh barrier for a new attempt, cancelling any previous one
    ///
    /// The barrier comes back already cancelled when a close is under way.
    pub fn arm_readiness(&self, required: usize) -> Arc<ReadinessBarrier> {
        let barrier = Arc::new(ReadinessBarrier::new(required));
        {
            let mut slot = self.readiness.lock();
            if let Some(previous) = slot.replace(Arc::clone(&barrier)) {
                previous.cancel();
            }
            if self.is_closing() {
                barrier.cancel();
            }
        }
        *self.auth_failure.lock() = None;
        barrier
    }

    pub fn disarm_readiness(&self) {
        self.readiness.lock().take();
    }

    /// Barrier of the attempt in progress, if any
    pub fn readiness(&self) -> Option<Arc<ReadinessBarrier>> {
        self.readiness.lock().clone()
    }

    /// Count one readiness event; ignored outside a connect window
    pub fn signal_ready(&self) {
        match self.readiness() {
            Some(barrier) => barrier.count_down(),
            None => debug!("[Session] Readiness event outside of a connect attempt"),
        }
    }

    pub fn record_auth_failure(&self, reason: String) {
        if let Some(barrier) = self.readiness() {
            barrier.fail(reason.clone());
        }
        *self.auth_failure.lock() = Some(reason);
    }

    pub fn auth_failure(&self) -> Option<String> {
        self.auth_failure.lock().clone()
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Enter closing mode and release every thread blocked on the current
    /// barrier or on a registry wait
    pub fn begin_close(&self) {
        self.closing.store(true, Ordering::SeqCst);
        if let Some(barrier) = self.readiness.lock().as_ref() {
            barrier.cancel();
        }
        self.registry.interrupt();
    }

    pub fn end_close(&self) {
        self.closing.store(false, Ordering::SeqCst);
    }

    /// Drop state the server will resend after a reconnect
    pub fn invalidate_caches(&self) {
        self.quotes.invalidate_heartbeats();
        self.orders.clear();
        self.positions.clear();
        self.wallets.clear();
        self.orderbooks.clear();
    }
}
