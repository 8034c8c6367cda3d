use super::{f64_at, i64_at, opt_f64_at, records, str_at, PayloadError};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

/// Order as reported on the account channel
///
/// `[ID, GID, CID, SYMBOL, MTS_CREATE, MTS_UPDATE, AMOUNT, AMOUNT_ORIG, TYPE,
/// TYPE_PREV, MTS_TIF, _, FLAGS, STATUS, _, _, PRICE, PRICE_AVG, ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOrder {
    pub id: i64,
    pub group_id: Option<i64>,
    pub client_id: i64,
    pub symbol: String,
    pub amount: f64,
    pub original_amount: f64,
    pub order_type: String,
    pub status: String,
    pub price: f64,
    pub average_price: Option<f64>,
}

impl OpenOrder {
    fn from_fields(fields: &[Value]) -> Result<Self, PayloadError> {
        Ok(Self {
            id: i64_at(fields, 0, "id")?,
            group_id: fields.get(1).and_then(Value::as_i64),
            client_id: i64_at(fields, 2, "cid")?,
            symbol: str_at(fields, 3, "symbol")?.to_string(),
            amount: f64_at(fields, 6, "amount")?,
            original_amount: f64_at(fields, 7, "amount_orig")?,
            order_type: str_at(fields, 8, "type")?.to_string(),
            status: str_at(fields, 13, "status")?.to_string(),
            price: f64_at(fields, 16, "price")?,
            average_price: opt_f64_at(fields, 17),
        })
    }

    pub fn from_payload(payload: &Value) -> Result<Vec<Self>, PayloadError> {
        records(payload)?.into_iter().map(Self::from_fields).collect()
    }

    /// Order left the book (filled or cancelled)
    pub fn is_closed(&self) -> bool {
        self.status.starts_with("EXECUTED") || self.status.starts_with("CANCELED")
    }
}

/// Cache of the account's open orders
#[derive(Default)]
pub struct OrderManager {
    orders: RwLock<HashMap<i64, OpenOrder>>,
}

impl OrderManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cache with an `os` snapshot
    pub fn handle_snapshot(&self, payload: &Value) -> Result<(), PayloadError> {
        let orders = OpenOrder::from_payload(payload)?;
        info!("[Orders] Snapshot with {} open orders", orders.len());

        let mut cache = self.orders.write();
        cache.clear();
        cache.extend(orders.into_iter().map(|order| (order.id, order)));
        Ok(())
    }

    /// Apply an `on`/`ou`/`oc` update
    pub fn handle_update(&self, payload: &Value) -> Result<(), PayloadError> {
        for order in OpenOrder::from_payload(payload)? {
            debug!(
                "[Orders] Order {} {} {} @ {} ({})",
                order.id, order.symbol, order.amount, order.price, order.status
            );
            let mut cache = self.orders.write();
            if order.is_closed() {
                cache.remove(&order.id);
            } else {
                cache.insert(order.id, order);
            }
        }
        Ok(())
    }

    pub fn get(&self, id: i64) -> Option<OpenOrder> {
        self.orders.read().get(&id).cloned()
    }

    /// Open orders sorted by id
    pub fn open_orders(&self) -> Vec<OpenOrder> {
        let mut orders: Vec<OpenOrder> = self.orders.read().values().cloned().collect();
        orders.sort_by_key(|order| order.id);
        orders
    }

    pub fn clear(&self) {
        self.orders.write().clear();
    }
}
