use super::{ApiCommand, CommandError, Credentials};
use crate::symbols::{CandlestickSymbol, CurrencyPair, OrderbookConfiguration, StreamSymbol};
use serde_json::json;

/// Keep-alive request, answered by a `pong` event
#[derive(Debug, Clone, Copy, Default)]
pub struct PingCommand;

impl ApiCommand for PingCommand {
    fn encode(&self, _credentials: Option<&Credentials>) -> Result<String, CommandError> {
        Ok(json!({"event": "ping"}).to_string())
    }
}

#[derive(Debug, Clone)]
pub struct SubscribeTickerCommand {
    pub pair: CurrencyPair,
}

impl SubscribeTickerCommand {
    pub fn new(pair: CurrencyPair) -> Self {
        Self { pair }
    }
}

impl ApiCommand for SubscribeTickerCommand {
    fn encode(&self, _credentials: Option<&Credentials>) -> Result<String, CommandError> {
        Ok(json!({
            "event": "subscribe",
            "channel": "ticker",
            "symbol": self.pair.to_symbol_string(),
        })
        .to_string())
    }
}

#[derive(Debug, Clone)]
pub struct SubscribeCandlesCommand {
    pub symbol: CandlestickSymbol,
}

impl SubscribeCandlesCommand {
    pub fn new(symbol: CandlestickSymbol) -> Self {
        Self { symbol }
    }
}

impl ApiCommand for SubscribeCandlesCommand {
    fn encode(&self, _credentials: Option<&Credentials>) -> Result<String, CommandError> {
        Ok(json!({
            "event": "subscribe",
            "channel": "candles",
            "key": self.symbol.to_key(),
        })
        .to_string())
    }
}

#[derive(Debug, Clone)]
pub struct SubscribeOrderbookCommand {
    pub config: OrderbookConfiguration,
}

impl SubscribeOrderbookCommand {
    pub fn new(config: OrderbookConfiguration) -> Self {
        Self { config }
    }
}

impl ApiCommand for SubscribeOrderbookCommand {
    fn encode(&self, _credentials: Option<&Credentials>) -> Result<String, CommandError> {
        if self.config.length == 0 {
            return Err(CommandError::InvalidArgument(
                "orderbook length must be greater than 0".to_string(),
            ));
        }

        Ok(json!({
            "event": "subscribe",
            "channel": "book",
            "symbol": self.config.pair.to_symbol_string(),
            "prec": self.config.precision.as_str(),
            "freq": self.config.frequency.as_str(),
            "len": self.config.length.to_string(),
        })
        .to_string())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UnsubscribeChannelCommand {
    pub channel_id: u32,
}

impl UnsubscribeChannelCommand {
    pub fn new(channel_id: u32) -> Self {
        Self { channel_id }
    }
}

impl ApiCommand for UnsubscribeChannelCommand {
    fn encode(&self, _credentials: Option<&Credentials>) -> Result<String, CommandError> {
        Ok(json!({"event": "unsubscribe", "chanId": self.channel_id}).to_string())
    }
}

/// Subscribe request for any stream symbol
pub fn subscribe_command(symbol: &StreamSymbol) -> Box<dyn ApiCommand> {
    match symbol {
        StreamSymbol::Ticker(pair) => Box::new(SubscribeTickerCommand::new(pair.clone())),
        StreamSymbol::Candles(candles) => Box::new(SubscribeCandlesCommand::new(candles.clone())),
        StreamSymbol::Orderbook(config) => Box::new(SubscribeOrderbookCommand::new(config.clone())),
    }
}
