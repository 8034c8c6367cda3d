//! Stream data handlers, one per stream symbol variant

use super::HandlerError;
use crate::session::SessionContext;
use crate::symbols::{CandlestickSymbol, CurrencyPair, OrderbookConfiguration};
use serde_json::Value;
use std::sync::Arc;

/// Consumer of data frames for one kind of stream symbol `S`
pub trait ChannelHandler<S>: Send + Sync {
    fn handle(&self, context: &SessionContext, symbol: &S, payload: &Value)
        -> Result<(), HandlerError>;
}

/// The handler set used by the router
///
/// Defaults feed the session's managers; tests and applications can swap
/// any of them.
#[derive(Clone)]
pub struct StreamHandlers {
    pub ticker: Arc<dyn ChannelHandler<CurrencyPair>>,
    pub candles: Arc<dyn ChannelHandler<CandlestickSymbol>>,
    pub orderbook: Arc<dyn ChannelHandler<OrderbookConfiguration>>,
}

impl Default for StreamHandlers {
    fn default() -> Self {
        Self {
            ticker: Arc::new(TickHandler),
            candles: Arc::new(CandlestickHandler),
            orderbook: Arc::new(OrderbookHandler),
        }
    }
}

impl StreamHandlers {
    pub fn with_ticker(mut self, handler: Arc<dyn ChannelHandler<CurrencyPair>>) -> Self {
        self.ticker = handler;
        self
    }

    pub fn with_candles(mut self, handler: Arc<dyn ChannelHandler<CandlestickSymbol>>) -> Self {
        self.candles = handler;
        self
    }

    pub fn with_orderbook(
        mut self,
        handler: Arc<dyn ChannelHandler<OrderbookConfiguration>>,
    ) -> Self {
        self.orderbook = handler;
        self
    }
}

pub struct TickHandler;

impl ChannelHandler<CurrencyPair> for TickHandler {
    fn handle(
        &self,
        context: &SessionContext,
        pair: &CurrencyPair,
        payload: &Value,
    ) -> Result<(), HandlerError> {
        Ok(context.quotes.handle_tick(pair, payload)?)
    }
}

pub struct CandlestickHandler;

impl ChannelHandler<CandlestickSymbol> for CandlestickHandler {
    fn handle(
        &self,
        context: &SessionContext,
        symbol: &CandlestickSymbol,
        payload: &Value,
    ) -> Result<(), HandlerError> {
        Ok(context.quotes.handle_candles(symbol, payload)?)
    }
}

pub struct OrderbookHandler;

impl ChannelHandler<OrderbookConfiguration> for OrderbookHandler {
    fn handle(
        &self,
        context: &SessionContext,
        config: &OrderbookConfiguration,
        payload: &Value,
    ) -> Result<(), HandlerError> {
        Ok(context.orderbooks.handle_entries(config, payload)?)
    }
}
