//! State kept up to date from inbound frames
//!
//! Each manager owns one cache (quotes, books, orders, positions, wallets)
//! behind its own lock. The router decodes payloads into these records; the
//! session clears the caches that a reconnect invalidates.

pub mod orderbook;
pub mod orders;
pub mod pool;
pub mod positions;
pub mod quote;
pub mod wallets;

pub use orderbook::{OrderbookEntry, OrderbookManager};
pub use orders::{OpenOrder, OrderManager};
pub use pool::WorkerPool;
pub use positions::{Position, PositionChange, PositionManager};
pub use quote::{Candle, QuoteManager, Tick};
pub use wallets::{Wallet, WalletManager};

use serde_json::Value;
use thiserror::Error;

/// A payload that does not have the expected shape
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PayloadError {
    #[error("Expected an array payload, got: {0}")]
    NotAnArray(String),

    #[error("Missing or invalid field '{name}' at index {index}")]
    InvalidField { name: &'static str, index: usize },

    #[error("Invalid symbol: {0}")]
    Symbol(#[from] crate::symbols::SymbolError),
}

pub(crate) fn as_array<'a>(payload: &'a Value) -> Result<&'a [Value], PayloadError> {
    payload
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| PayloadError::NotAnArray(truncate(payload)))
}

/// Array of records, or a single record wrapped into one
///
/// Snapshots arrive as `[[...], [...]]`, updates as `[...]`.
pub(crate) fn records<'a>(payload: &'a Value) -> Result<Vec<&'a [Value]>, PayloadError> {
    let items = as_array(payload)?;
    if items.iter().all(Value::is_array) {
        items.iter().map(as_array).collect()
    } else {
        Ok(vec![items])
    }
}

pub(crate) fn f64_at(fields: &[Value], index: usize, name: &'static str) -> Result<f64, PayloadError> {
    opt_f64_at(fields, index).ok_or(PayloadError::InvalidField { name, index })
}

pub(crate) fn opt_f64_at(fields: &[Value], index: usize) -> Option<f64> {
    fields.get(index).and_then(Value::as_f64)
}

pub(crate) fn i64_at(fields: &[Value], index: usize, name: &'static str) -> Result<i64, PayloadError> {
    fields
        .get(index)
        .and_then(Value::as_i64)
        .ok_or(PayloadError::InvalidField { name, index })
}

pub(crate) fn str_at<'a>(
    fields: &'a [Value],
    index: usize,
    name: &'static str,
) -> Result<&'a str, PayloadError> {
    fields
        .get(index)
        .and_then(Value::as_str)
        .ok_or(PayloadError::InvalidField { name, index })
}

fn truncate(value: &Value) -> String {
    let mut text = value.to_string();
    if text.len() > 80 {
        let mut end = 80;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
        text.push_str("...");
    }
    text
}
