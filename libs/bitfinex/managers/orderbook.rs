use super::{f64_at, i64_at, records, PayloadError, WorkerPool};
use crate::symbols::OrderbookConfiguration;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// One price level: `[PRICE, COUNT, AMOUNT]`
///
/// Positive amounts are bids, negative amounts asks. A count of 0 removes
/// the level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderbookEntry {
    pub price: f64,
    pub count: i64,
    pub amount: f64,
}

impl OrderbookEntry {
    fn from_fields(fields: &[Value]) -> Result<Self, PayloadError> {
        Ok(Self {
            price: f64_at(fields, 0, "price")?,
            count: i64_at(fields, 1, "count")?,
            amount: f64_at(fields, 2, "amount")?,
        })
    }

    pub fn from_payload(payload: &Value) -> Result<Vec<Self>, PayloadError> {
        records(payload)?.into_iter().map(Self::from_fields).collect()
    }

    pub fn is_bid(&self) -> bool {
        self.amount > 0.0
    }
}

#[derive(Debug, Default, Clone)]
struct Book {
    bids: Vec<OrderbookEntry>,
    asks: Vec<OrderbookEntry>,
}

impl Book {
    fn apply(&mut self, entry: OrderbookEntry) {
        let side = if entry.is_bid() {
            &mut self.bids
        } else {
            &mut self.asks
        };
        let position = side.iter().position(|level| level.price == entry.price);

        match (entry.count, position) {
            (0, Some(index)) => {
                side.remove(index);
            }
            (0, None) => {}
            (_, Some(index)) => side[index] = entry,
            (_, None) => side.push(entry),
        }
    }

    fn sort(&mut self) {
        self.bids.sort_by(|a, b| b.price.total_cmp(&a.price));
        self.asks.sort_by(|a, b| a.price.total_cmp(&b.price));
    }
}

pub type OrderbookCallback = Arc<dyn Fn(&OrderbookConfiguration, &[OrderbookEntry]) + Send + Sync>;

/// Local copy of every subscribed book
pub struct OrderbookManager {
    pool: Arc<WorkerPool>,
    books: RwLock<HashMap<OrderbookConfiguration, Book>>,
    callbacks: RwLock<HashMap<OrderbookConfiguration, Vec<OrderbookCallback>>>,
}

impl OrderbookManager {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            pool,
            books: RwLock::new(HashMap::new()),
            callbacks: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_callback(&self, config: OrderbookConfiguration, callback: OrderbookCallback) {
        self.callbacks.write().entry(config).or_default().push(callback);
    }

    pub fn handle_entries(
        &self,
        config: &OrderbookConfiguration,
        payload: &Value,
    ) -> Result<(), PayloadError> {
        let entries = OrderbookEntry::from_payload(payload)?;
        let snapshot = payload
            .as_array()
            .is_some_and(|items| items.first().is_some_and(Value::is_array));

        {
            let mut books = self.books.write();
            let book = books.entry(config.clone()).or_default();
            if snapshot {
                *book = Book::default();
            }
            for entry in &entries {
                book.apply(*entry);
            }
            book.sort();
        }

        let callbacks = self.callbacks.read().get(config).cloned().unwrap_or_default();
        for callback in callbacks {
            let config = config.clone();
            let entries = entries.clone();
            self.pool.execute(move || callback(&config, &entries));
        }
        Ok(())
    }

    /// Bids, best first
    pub fn bids(&self, config: &OrderbookConfiguration) -> Vec<OrderbookEntry> {
        self.books
            .read()
            .get(config)
            .map(|book| book.bids.clone())
            .unwrap_or_default()
    }

    /// Asks, best first
    pub fn asks(&self, config: &OrderbookConfiguration) -> Vec<OrderbookEntry> {
        self.books
            .read()
            .get(config)
            .map(|book| book.asks.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        self.books.write().clear();
    }
}
