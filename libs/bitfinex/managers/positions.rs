use super::{f64_at, opt_f64_at, records, str_at, PayloadError, WorkerPool};
use crate::symbols::CurrencyPair;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Margin position: `[SYMBOL, STATUS, AMOUNT, BASE_PRICE, FUNDING, FUNDING_TYPE, PL, PL_PERC, PRICE_LIQ, LEVERAGE]`
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub pair: CurrencyPair,
    pub status: String,
    pub amount: f64,
    pub base_price: f64,
    pub margin_funding: f64,
    pub profit_loss: Option<f64>,
    pub liquidation_price: Option<f64>,
    pub leverage: Option<f64>,
}

impl Position {
    fn from_fields(fields: &[Value]) -> Result<Self, PayloadError> {
        Ok(Self {
            pair: CurrencyPair::from_symbol_string(str_at(fields, 0, "symbol")?)?,
            status: str_at(fields, 1, "status")?.to_string(),
            amount: f64_at(fields, 2, "amount")?,
            base_price: f64_at(fields, 3, "base_price")?,
            margin_funding: opt_f64_at(fields, 4).unwrap_or(0.0),
            profit_loss: opt_f64_at(fields, 6),
            liquidation_price: opt_f64_at(fields, 8),
            leverage: opt_f64_at(fields, 9),
        })
    }

    pub fn from_payload(payload: &Value) -> Result<Vec<Self>, PayloadError> {
        records(payload)?.into_iter().map(Self::from_fields).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.status == "CLOSED" || self.amount == 0.0
    }
}

/// How a decoded batch changes the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionChange {
    /// `ps`: replace everything
    Snapshot,
    /// `pn`/`pu`: insert or update
    Update,
    /// `pc`: remove
    Close,
}

/// Cache of open margin positions
///
/// Decoding happens on the caller's thread; applying the batch runs on the
/// worker pool.
pub struct PositionManager {
    pool: Arc<WorkerPool>,
    positions: Arc<RwLock<HashMap<CurrencyPair, Position>>>,
}

impl PositionManager {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            pool,
            positions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Decode `payload` and apply it on the pool
    ///
    /// `on_applied` runs on the pool once the cache reflects the batch.
    pub fn submit<F>(
        &self,
        change: PositionChange,
        payload: &Value,
        on_applied: F,
    ) -> Result<(), PayloadError>
    where
        F: FnOnce() + Send + 'static,
    {
        let batch = Position::from_payload(payload)?;
        let positions = Arc::clone(&self.positions);

        self.pool.execute(move || {
            apply(&positions, change, batch);
            on_applied();
        });
        Ok(())
    }

    pub fn position(&self, pair: &CurrencyPair) -> Option<Position> {
        self.positions.read().get(pair).cloned()
    }

    pub fn positions(&self) -> Vec<Position> {
        self.positions.read().values().cloned().collect()
    }

    pub fn clear(&self) {
        self.positions.write().clear();
    }
}

fn apply(
    positions: &RwLock<HashMap<CurrencyPair, Position>>,
    change: PositionChange,
    batch: Vec<Position>,
) {
    let mut cache = positions.write();
    if change == PositionChange::Snapshot {
        cache.clear();
    }

    for position in batch {
        debug!(
            "[Positions] {:?} {} {} @ {}",
            change, position.pair, position.amount, position.base_price
        );
        if change == PositionChange::Close || position.is_closed() {
            cache.remove(&position.pair);
        } else {
            cache.insert(position.pair.clone(), position);
        }
    }
}
