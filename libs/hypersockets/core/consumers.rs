use crate::traits::{ConsumerId, InboundConsumer};
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::error;

/// Registered inbound consumers
///
/// Dispatch clones the consumer list under a read lock and calls each
/// consumer without holding it, so a consumer may add or remove consumers.
#[derive(Default)]
pub struct ConsumerSet {
    next_id: AtomicU64,
    consumers: RwLock<Vec<(ConsumerId, InboundConsumer)>>,
}

impl ConsumerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, consumer: InboundConsumer) -> ConsumerId {
        let id = ConsumerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.consumers.write().push((id, consumer));
        id
    }

    pub fn remove(&self, id: ConsumerId) -> bool {
        let mut consumers = self.consumers.write();
        let before = consumers.len();
        consumers.retain(|(existing, _)| *existing != id);
        consumers.len() != before
    }

    pub fn len(&self) -> usize {
        self.consumers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.read().is_empty()
    }

    /// Deliver one text frame to every consumer, in registration order
    ///
    /// A panicking consumer is logged and skipped; it neither stops later
    /// consumers nor the dispatch thread.
    pub fn dispatch(&self, text: &str) {
        let snapshot: Vec<InboundConsumer> = self
            .consumers
            .read()
            .iter()
            .map(|(_, consumer)| consumer.clone())
            .collect();

        for consumer in snapshot {
            if catch_unwind(AssertUnwindSafe(|| consumer(text))).is_err() {
                error!("[Transport] Consumer panicked while handling a frame");
            }
        }
    }
}
