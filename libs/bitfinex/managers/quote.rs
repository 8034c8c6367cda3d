use super::{f64_at, i64_at, records, PayloadError, WorkerPool};
use crate::symbols::{CandlestickSymbol, CurrencyPair, StreamSymbol};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Ticker update: `[BID, BID_SIZE, ASK, ASK_SIZE, CHANGE, CHANGE_PERC, LAST, VOLUME, HIGH, LOW]`
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub pair: CurrencyPair,
    pub bid: f64,
    pub ask: f64,
    pub last_price: f64,
    pub volume: f64,
    pub high: f64,
    pub low: f64,
    pub received_at: DateTime<Utc>,
}

impl Tick {
    pub fn from_payload(pair: CurrencyPair, payload: &Value) -> Result<Self, PayloadError> {
        let fields = super::as_array(payload)?;
        Ok(Self {
            pair,
            bid: f64_at(fields, 0, "bid")?,
            ask: f64_at(fields, 2, "ask")?,
            last_price: f64_at(fields, 6, "last_price")?,
            volume: f64_at(fields, 7, "volume")?,
            high: f64_at(fields, 8, "high")?,
            low: f64_at(fields, 9, "low")?,
            received_at: Utc::now(),
        })
    }
}

/// Candle: `[MTS, OPEN, CLOSE, HIGH, LOW, VOLUME]`
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub timestamp_ms: i64,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
}

impl Candle {
    fn from_fields(fields: &[Value]) -> Result<Self, PayloadError> {
        Ok(Self {
            timestamp_ms: i64_at(fields, 0, "mts")?,
            open: f64_at(fields, 1, "open")?,
            close: f64_at(fields, 2, "close")?,
            high: f64_at(fields, 3, "high")?,
            low: f64_at(fields, 4, "low")?,
            volume: f64_at(fields, 5, "volume")?,
        })
    }

    /// Decode a snapshot or a single update
    pub fn from_payload(payload: &Value) -> Result<Vec<Self>, PayloadError> {
        records(payload)?.into_iter().map(Self::from_fields).collect()
    }
}

pub type TickCallback = Arc<dyn Fn(&Tick) + Send + Sync>;
pub type CandleCallback = Arc<dyn Fn(&CandlestickSymbol, &Candle) + Send + Sync>;

/// Latest ticks and candles, plus per-channel liveness
///
/// Callbacks run on the worker pool, never on the receive path.
pub struct QuoteManager {
    pool: Arc<WorkerPool>,
    heartbeats: Mutex<HashMap<StreamSymbol, DateTime<Utc>>>,
    last_ticks: RwLock<HashMap<CurrencyPair, Tick>>,
    last_candles: RwLock<HashMap<CandlestickSymbol, Candle>>,
    tick_callbacks: RwLock<HashMap<CurrencyPair, Vec<TickCallback>>>,
    candle_callbacks: RwLock<HashMap<CandlestickSymbol, Vec<CandleCallback>>>,
}

impl QuoteManager {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            pool,
            heartbeats: Mutex::new(HashMap::new()),
            last_ticks: RwLock::new(HashMap::new()),
            last_candles: RwLock::new(HashMap::new()),
            tick_callbacks: RwLock::new(HashMap::new()),
            candle_callbacks: RwLock::new(HashMap::new()),
        }
    }

    /// Record activity on the channel carrying `symbol`
    pub fn update_channel_heartbeat(&self, symbol: &StreamSymbol) {
        self.heartbeats.lock().insert(symbol.clone(), Utc::now());
    }

    pub fn last_heartbeat(&self, symbol: &StreamSymbol) -> Option<DateTime<Utc>> {
        self.heartbeats.lock().get(symbol).copied()
    }

    pub fn invalidate_ticker_heartbeat(&self, symbol: &StreamSymbol) {
        self.heartbeats.lock().remove(symbol);
    }

    /// Forget every channel heartbeat
    pub fn invalidate_heartbeats(&self) {
        self.heartbeats.lock().clear();
    }

    pub fn register_tick_callback(&self, pair: CurrencyPair, callback: TickCallback) {
        self.tick_callbacks.write().entry(pair).or_default().push(callback);
    }

    pub fn register_candle_callback(&self, symbol: CandlestickSymbol, callback: CandleCallback) {
        self.candle_callbacks.write().entry(symbol).or_default().push(callback);
    }

    pub fn last_tick(&self, pair: &CurrencyPair) -> Option<Tick> {
        self.last_ticks.read().get(pair).cloned()
    }

    pub fn last_candle(&self, symbol: &CandlestickSymbol) -> Option<Candle> {
        self.last_candles.read().get(symbol).cloned()
    }

    pub fn handle_tick(&self, pair: &CurrencyPair, payload: &Value) -> Result<(), PayloadError> {
        let tick = Tick::from_payload(pair.clone(), payload)?;
        self.update_channel_heartbeat(&StreamSymbol::Ticker(pair.clone()));
        self.last_ticks.write().insert(pair.clone(), tick.clone());

        let callbacks = self.tick_callbacks.read().get(pair).cloned().unwrap_or_default();
        for callback in callbacks {
            let tick = tick.clone();
            self.pool.execute(move || callback(&tick));
        }
        Ok(())
    }

    pub fn handle_candles(
        &self,
        symbol: &CandlestickSymbol,
        payload: &Value,
    ) -> Result<(), PayloadError> {
        let mut candles = Candle::from_payload(payload)?;
        self.update_channel_heartbeat(&StreamSymbol::Candles(symbol.clone()));

        // Snapshots list newest first
        candles.sort_by_key(|candle| candle.timestamp_ms);
        let Some(latest) = candles.last().cloned() else {
            debug!("[Quotes] Empty candle payload for {}", symbol);
            return Ok(());
        };

        {
            let mut last = self.last_candles.write();
            let newer = last
                .get(symbol)
                .map_or(true, |current| current.timestamp_ms <= latest.timestamp_ms);
            if newer {
                last.insert(symbol.clone(), latest);
            }
        }

        let callbacks = self
            .candle_callbacks
            .read()
            .get(symbol)
            .cloned()
            .unwrap_or_default();
        for callback in callbacks {
            let symbol = symbol.clone();
            let candles = candles.clone();
            self.pool.execute(move || {
                for candle in &candles {
                    callback(&symbol, candle);
                }
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::Timeframe;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn btc() -> CurrencyPair {
        CurrencyPair::new("BTC", "USD")
    }

    #[test]
    fn test_tick_is_stored_and_dispatched() {
        let pool = Arc::new(WorkerPool::new(1));
        let manager = QuoteManager::new(Arc::clone(&pool));
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        manager.register_tick_callback(
            btc(),
            Arc::new(move |tick: &Tick| {
                assert_eq!(tick.last_price, 105.0);
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let payload = json!([100.0, 1.0, 101.0, 2.0, 0.5, 0.01, 105.0, 1000.0, 110.0, 90.0]);
        manager.handle_tick(&btc(), &payload).unwrap();

        pool.shutdown();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(manager.last_tick(&btc()).unwrap().ask, 101.0);
        assert!(manager
            .last_heartbeat(&StreamSymbol::Ticker(btc()))
            .is_some());
    }

    #[test]
    fn test_candle_snapshot_keeps_latest() {
        let manager = QuoteManager::new(Arc::new(WorkerPool::new(1)));
        let symbol = CandlestickSymbol::new(btc(), Timeframe::OneMinute);

        let snapshot = json!([[3000, 1, 2, 3, 0.5, 10], [1000, 1, 2, 3, 0.5, 10]]);
        manager.handle_candles(&symbol, &snapshot).unwrap();
        assert_eq!(manager.last_candle(&symbol).unwrap().timestamp_ms, 3000);

        // Late update for an older bucket does not win
        manager.handle_candles(&symbol, &json!([2000, 1, 2, 3, 0.5, 10])).unwrap();
        assert_eq!(manager.last_candle(&symbol).unwrap().timestamp_ms, 3000);
    }

    #[test]
    fn test_invalid_tick_is_rejected() {
        let manager = QuoteManager::new(Arc::new(WorkerPool::new(1)));
        assert!(manager.handle_tick(&btc(), &json!([1.0, 2.0])).is_err());
        assert!(manager.last_tick(&btc()).is_none());
    }

    #[test]
    fn test_invalidate_heartbeats() {
        let manager = QuoteManager::new(Arc::new(WorkerPool::new(1)));
        let symbol = StreamSymbol::Ticker(btc());
        manager.update_channel_heartbeat(&symbol);
        manager.invalidate_ticker_heartbeat(&symbol);
        assert!(manager.last_heartbeat(&symbol).is_none());

        manager.update_channel_heartbeat(&symbol);
        manager.invalidate_heartbeats();
        assert!(manager.last_heartbeat(&symbol).is_none());
    }
}
