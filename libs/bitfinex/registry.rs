//! Channel registry
//!
//! Bidirectional association between server-assigned channel ids and the
//! [`StreamSymbol`]s they carry. Every access goes through one mutex; a
//! condition variable paired with it lets callers wait for the registry to
//! reach a given size without polling.

use crate::symbols::{StreamKind, StreamSymbol};
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// One channel id bound to one symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelBinding {
    pub channel_id: u32,
    pub symbol: StreamSymbol,
}

/// Bindings captured right before a resubscribe
///
/// Used to resend the subscriptions and to restore the registry when they
/// are not confirmed in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingSubscriptionSet {
    bindings: Vec<ChannelBinding>,
}

impl PendingSubscriptionSet {
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn bindings(&self) -> &[ChannelBinding] {
        &self.bindings
    }

    /// Symbols grouped by stream kind, in a stable order
    pub fn by_kind(&self) -> BTreeMap<StreamKind, Vec<&StreamSymbol>> {
        let mut grouped: BTreeMap<StreamKind, Vec<&StreamSymbol>> = BTreeMap::new();
        for binding in &self.bindings {
            grouped
                .entry(binding.symbol.kind())
                .or_default()
                .push(&binding.symbol);
        }
        grouped
    }
}

#[derive(Default)]
struct RegistryInner {
    bindings: HashMap<u32, StreamSymbol>,
    /// Bumped by `interrupt()`; waiters compare against the value seen on entry
    interrupts: u64,
}

/// Thread-safe channel id ↔ symbol registry
#[derive(Default)]
pub struct ChannelRegistry {
    inner: Mutex<RegistryInner>,
    changed: Condvar,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `channel_id` to `symbol`, replacing any previous binding of that id
    ///
    /// A symbol is bound at most once: if it is already bound under another
    /// id, that stale binding is dropped.
    pub fn bind(&self, channel_id: u32, symbol: StreamSymbol) {
        let mut inner = self.inner.lock();

        let stale: Vec<u32> = inner
            .bindings
            .iter()
            .filter(|(id, bound)| **id != channel_id && **bound == symbol)
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            warn!(
                "[Registry] {} was already bound to channel {}, rebinding to {}",
                symbol, id, channel_id
            );
            inner.bindings.remove(&id);
        }

        if let Some(previous) = inner.bindings.insert(channel_id, symbol) {
            debug!("[Registry] Channel {} replaced binding {}", channel_id, previous);
        }
        self.changed.notify_all();
    }

    /// Remove the binding for `channel_id`, returning the symbol it carried
    pub fn unbind(&self, channel_id: u32) -> Option<StreamSymbol> {
        let mut inner = self.inner.lock();
        let removed = inner.bindings.remove(&channel_id);
        self.changed.notify_all();
        removed
    }

    pub fn resolve(&self, channel_id: u32) -> Option<StreamSymbol> {
        self.inner.lock().bindings.get(&channel_id).cloned()
    }

    /// Channel currently carrying `symbol`
    pub fn find_channel(&self, symbol: &StreamSymbol) -> Option<u32> {
        self.inner
            .lock()
            .bindings
            .iter()
            .find(|(_, bound)| *bound == symbol)
            .map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().bindings.is_empty()
    }

    /// Copy of all bindings, ordered by channel id
    pub fn bindings(&self) -> Vec<ChannelBinding> {
        let inner = self.inner.lock();
        let mut bindings: Vec<ChannelBinding> = inner
            .bindings
            .iter()
            .map(|(id, symbol)| ChannelBinding {
                channel_id: *id,
                symbol: symbol.clone(),
            })
            .collect();
        bindings.sort_by_key(|binding| binding.channel_id);
        bindings
    }

    /// Capture every binding and empty the registry in one step
    pub fn snapshot_and_clear(&self) -> PendingSubscriptionSet {
        let mut inner = self.inner.lock();
        let mut bindings: Vec<ChannelBinding> = inner
            .bindings
            .drain()
            .map(|(channel_id, symbol)| ChannelBinding { channel_id, symbol })
            .collect();
        bindings.sort_by_key(|binding| binding.channel_id);
        self.changed.notify_all();
        PendingSubscriptionSet { bindings }
    }

    /// Replace the registry content with `snapshot`
    pub fn restore(&self, snapshot: &PendingSubscriptionSet) {
        let mut inner = self.inner.lock();
        inner.bindings = snapshot
            .bindings
            .iter()
            .map(|binding| (binding.channel_id, binding.symbol.clone()))
            .collect();
        self.changed.notify_all();
    }

    /// Block until the registry holds exactly `expected` bindings
    ///
    /// Returns `false` when `timeout` elapses first or when `interrupt()` is
    /// called during the wait. The size check and the wait happen under the
    /// same lock, so a `bind` racing with this call cannot be missed.
    pub fn wait_for_count(&self, expected: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        let epoch = inner.interrupts;

        loop {
            if inner.bindings.len() == expected {
                return true;
            }
            if inner.interrupts != epoch {
                return false;
            }
            if self.changed.wait_until(&mut inner, deadline).timed_out() {
                return inner.bindings.len() == expected;
            }
        }
    }

    /// Wake every waiter in `wait_for_count` and make it return `false`
    pub fn interrupt(&self) {
        let mut inner = self.inner.lock();
        inner.interrupts = inner.interrupts.wrapping_add(1);
        self.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{CandlestickSymbol, CurrencyPair, Timeframe};
    use std::sync::Arc;
    use std::thread;

    fn ticker(base: &str) -> StreamSymbol {
        StreamSymbol::Ticker(CurrencyPair::new(base, "USD"))
    }

    #[test]
    fn test_bind_resolve_unbind() {
        let registry = ChannelRegistry::new();
        registry.bind(5, ticker("BTC"));

        assert_eq!(registry.resolve(5), Some(ticker("BTC")));
        assert_eq!(registry.find_channel(&ticker("BTC")), Some(5));
        assert_eq!(registry.unbind(5), Some(ticker("BTC")));
        assert_eq!(registry.resolve(5), None);
        assert_eq!(registry.unbind(5), None);
    }

    #[test]
    fn test_rebinding_symbol_drops_old_channel() {
        let registry = ChannelRegistry::new();
        registry.bind(1, ticker("BTC"));
        registry.bind(2, ticker("BTC"));

        assert_eq!(registry.resolve(1), None);
        assert_eq!(registry.find_channel(&ticker("BTC")), Some(2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_snapshot_and_restore_are_exact() {
        let registry = ChannelRegistry::new();
        let candles = StreamSymbol::Candles(CandlestickSymbol::new(
            CurrencyPair::new("ETH", "USD"),
            Timeframe::OneHour,
        ));
        registry.bind(1, ticker("BTC"));
        registry.bind(2, candles.clone());

        let snapshot = registry.snapshot_and_clear();
        assert!(registry.is_empty());
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.by_kind()[&StreamKind::Candles], vec![&candles]);

        registry.bind(9, ticker("XRP"));
        registry.restore(&snapshot);
        assert_eq!(registry.bindings(), snapshot.bindings().to_vec());
    }

    #[test]
    fn test_wait_for_count_times_out() {
        let registry = ChannelRegistry::new();
        let started = Instant::now();
        assert!(!registry.wait_for_count(1, Duration::from_millis(50)));
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(registry.wait_for_count(0, Duration::from_millis(0)));
    }

    #[test]
    fn test_wait_for_count_wakes_on_bind() {
        let registry = Arc::new(ChannelRegistry::new());

        let binder = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                registry.bind(1, ticker("BTC"));
                registry.bind(2, ticker("ETH"));
            })
        };

        assert!(registry.wait_for_count(2, Duration::from_secs(5)));
        binder.join().unwrap();
    }

    #[test]
    fn test_interrupt_releases_waiter() {
        let registry = Arc::new(ChannelRegistry::new());

        let waiter = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let started = Instant::now();
                let satisfied = registry.wait_for_count(3, Duration::from_secs(30));
                (satisfied, started.elapsed())
            })
        };

        // Keep interrupting until the waiter has observed one
        while !waiter.is_finished() {
            registry.interrupt();
            thread::sleep(Duration::from_millis(10));
        }

        let (satisfied, waited) = waiter.join().unwrap();
        assert!(!satisfied);
        assert!(waited < Duration::from_secs(5));
    }
}
