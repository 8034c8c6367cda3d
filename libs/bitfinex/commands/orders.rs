use super::{ApiCommand, CommandError, Credentials};
use crate::symbols::CurrencyPair;
use serde_json::{json, Map, Value};

const FLAG_HIDDEN: u32 = 64;
const FLAG_POST_ONLY: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Limit,
    Market,
    Stop,
    ExchangeLimit,
    ExchangeMarket,
    ExchangeStop,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "LIMIT",
            OrderType::Market => "MARKET",
            OrderType::Stop => "STOP",
            OrderType::ExchangeLimit => "EXCHANGE LIMIT",
            OrderType::ExchangeMarket => "EXCHANGE MARKET",
            OrderType::ExchangeStop => "EXCHANGE STOP",
        }
    }

    fn requires_price(&self) -> bool {
        !matches!(self, OrderType::Market | OrderType::ExchangeMarket)
    }
}

/// New order request
///
/// Positive `amount` buys, negative sells.
#[derive(Debug, Clone)]
pub struct ExchangeOrder {
    pub pair: CurrencyPair,
    pub order_type: OrderType,
    pub amount: f64,
    pub price: Option<f64>,
    pub client_id: i64,
    pub group_id: Option<i64>,
    pub hidden: bool,
    pub post_only: bool,
}

impl ExchangeOrder {
    /// Limit order with a client id derived from the current time
    pub fn limit(pair: CurrencyPair, amount: f64, price: f64) -> Self {
        Self {
            pair,
            order_type: OrderType::ExchangeLimit,
            amount,
            price: Some(price),
            client_id: chrono::Utc::now().timestamp_millis(),
            group_id: None,
            hidden: false,
            post_only: false,
        }
    }

    pub fn market(pair: CurrencyPair, amount: f64) -> Self {
        Self {
            order_type: OrderType::ExchangeMarket,
            price: None,
            ..Self::limit(pair, amount, 0.0)
        }
    }

    pub fn with_group(mut self, group_id: i64) -> Self {
        self.group_id = Some(group_id);
        self
    }

    fn flags(&self) -> u32 {
        let mut flags = 0;
        if self.hidden {
            flags |= FLAG_HIDDEN;
        }
        if self.post_only {
            flags |= FLAG_POST_ONLY;
        }
        flags
    }
}

/// Submit a new order (`on`)
#[derive(Debug, Clone)]
pub struct OrderCommand {
    pub order: ExchangeOrder,
}

impl OrderCommand {
    pub fn new(order: ExchangeOrder) -> Self {
        Self { order }
    }
}

impl ApiCommand for OrderCommand {
    fn encode(&self, _credentials: Option<&Credentials>) -> Result<String, CommandError> {
        let order = &self.order;

        if !order.amount.is_finite() || order.amount == 0.0 {
            return Err(CommandError::InvalidArgument(format!(
                "order amount {} must be finite and non-zero",
                order.amount
            )));
        }

        let mut body = Map::new();
        body.insert("cid".to_string(), json!(order.client_id));
        body.insert("type".to_string(), json!(order.order_type.as_str()));
        body.insert("symbol".to_string(), json!(order.pair.to_symbol_string()));
        body.insert("amount".to_string(), json!(order.amount.to_string()));

        match (order.order_type.requires_price(), order.price) {
            (true, Some(price)) if price.is_finite() && price > 0.0 => {
                body.insert("price".to_string(), json!(price.to_string()));
            }
            (true, _) => {
                return Err(CommandError::InvalidArgument(format!(
                    "{} order requires a positive price",
                    order.order_type.as_str()
                )));
            }
            (false, _) => {}
        }

        if let Some(group_id) = order.group_id {
            body.insert("gid".to_string(), json!(group_id));
        }

        let flags = order.flags();
        if flags != 0 {
            body.insert("flags".to_string(), json!(flags));
        }

        Ok(json!([0, "on", Value::Null, Value::Object(body)]).to_string())
    }
}

/// Cancel one order by exchange id (`oc`)
#[derive(Debug, Clone, Copy)]
pub struct CancelOrderCommand {
    pub order_id: i64,
}

impl CancelOrderCommand {
    pub fn new(order_id: i64) -> Self {
        Self { order_id }
    }
}

impl ApiCommand for CancelOrderCommand {
    fn encode(&self, _credentials: Option<&Credentials>) -> Result<String, CommandError> {
        Ok(json!([0, "oc", Value::Null, {"id": self.order_id}]).to_string())
    }
}

/// Cancel every order of a group (`oc_multi`)
#[derive(Debug, Clone, Copy)]
pub struct CancelOrderGroupCommand {
    pub group_id: i64,
}

impl CancelOrderGroupCommand {
    pub fn new(group_id: i64) -> Self {
        Self { group_id }
    }
}

impl ApiCommand for CancelOrderGroupCommand {
    fn encode(&self, _credentials: Option<&Credentials>) -> Result<String, CommandError> {
        Ok(json!([0, "oc_multi", Value::Null, {"gid": [self.group_id]}]).to_string())
    }
}
