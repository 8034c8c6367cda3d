//! Stream symbols
//!
//! A [`StreamSymbol`] identifies one subscribable feed. The set of variants is
//! closed: every dispatch point matches on it exhaustively, so adding a stream
//! kind is a compile error until each match handles it.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    #[error("Invalid symbol string: {0}")]
    InvalidSymbol(String),

    #[error("Invalid timeframe: {0}")]
    InvalidTimeframe(String),

    #[error("Invalid orderbook setting: {0}")]
    InvalidOrderbook(String),

    #[error("Missing field '{0}'")]
    MissingField(&'static str),

    #[error("Unknown channel type: {0}")]
    UnknownChannel(String),
}

// =============================================================================
// Currency pair
// =============================================================================

/// Trading pair such as BTC/USD, written `tBTCUSD` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CurrencyPair {
    base: String,
    quote: String,
}

impl CurrencyPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
        }
    }

    /// Parse `tBTCUSD`, `BTCUSD` or the long form `tDUSK:USD`
    pub fn from_symbol_string(symbol: &str) -> Result<Self, SymbolError> {
        let raw = symbol.strip_prefix('t').unwrap_or(symbol);

        if let Some((base, quote)) = raw.split_once(':') {
            if base.is_empty() || quote.is_empty() {
                return Err(SymbolError::InvalidSymbol(symbol.to_string()));
            }
            return Ok(Self::new(base, quote));
        }

        if raw.len() == 6 && raw.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Ok(Self::new(&raw[..3], &raw[3..]));
        }

        Err(SymbolError::InvalidSymbol(symbol.to_string()))
    }

    /// Wire representation, e.g. `tBTCUSD`
    pub fn to_symbol_string(&self) -> String {
        if self.base.len() == 3 && self.quote.len() == 3 {
            format!("t{}{}", self.base, self.quote)
        } else {
            format!("t{}:{}", self.base, self.quote)
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_symbol_string())
    }
}

// =============================================================================
// Candles
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    ThreeHours,
    SixHours,
    TwelveHours,
    OneDay,
    SevenDays,
    FourteenDays,
    OneMonth,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1m",
            Timeframe::FiveMinutes => "5m",
            Timeframe::FifteenMinutes => "15m",
            Timeframe::ThirtyMinutes => "30m",
            Timeframe::OneHour => "1h",
            Timeframe::ThreeHours => "3h",
            Timeframe::SixHours => "6h",
            Timeframe::TwelveHours => "12h",
            Timeframe::OneDay => "1D",
            Timeframe::SevenDays => "7D",
            Timeframe::FourteenDays => "14D",
            Timeframe::OneMonth => "1M",
        }
    }

    pub fn parse(value: &str) -> Result<Self, SymbolError> {
        let timeframe = match value {
            "1m" => Timeframe::OneMinute,
            "5m" => Timeframe::FiveMinutes,
            "15m" => Timeframe::FifteenMinutes,
            "30m" => Timeframe::ThirtyMinutes,
            "1h" => Timeframe::OneHour,
            "3h" => Timeframe::ThreeHours,
            "6h" => Timeframe::SixHours,
            "12h" => Timeframe::TwelveHours,
            "1D" => Timeframe::OneDay,
            "7D" => Timeframe::SevenDays,
            "14D" => Timeframe::FourteenDays,
            "1M" => Timeframe::OneMonth,
            other => return Err(SymbolError::InvalidTimeframe(other.to_string())),
        };
        Ok(timeframe)
    }
}

/// Candle series key: pair plus timeframe, `trade:1m:tBTCUSD` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandlestickSymbol {
    pub pair: CurrencyPair,
    pub timeframe: Timeframe,
}

impl CandlestickSymbol {
    pub fn new(pair: CurrencyPair, timeframe: Timeframe) -> Self {
        Self { pair, timeframe }
    }

    pub fn from_key(key: &str) -> Result<Self, SymbolError> {
        let mut parts = key.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("trade"), Some(timeframe), Some(pair)) => Ok(Self {
                pair: CurrencyPair::from_symbol_string(pair)?,
                timeframe: Timeframe::parse(timeframe)?,
            }),
            _ => Err(SymbolError::InvalidSymbol(key.to_string())),
        }
    }

    pub fn to_key(&self) -> String {
        format!("trade:{}:{}", self.timeframe.as_str(), self.pair)
    }
}

impl fmt::Display for CandlestickSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key())
    }
}

// =============================================================================
// Order book
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderbookPrecision {
    P0,
    P1,
    P2,
    P3,
    P4,
    /// Raw book: individual orders instead of price levels
    R0,
}

impl OrderbookPrecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderbookPrecision::P0 => "P0",
            OrderbookPrecision::P1 => "P1",
            OrderbookPrecision::P2 => "P2",
            OrderbookPrecision::P3 => "P3",
            OrderbookPrecision::P4 => "P4",
            OrderbookPrecision::R0 => "R0",
        }
    }

    pub fn parse(value: &str) -> Result<Self, SymbolError> {
        match value {
            "P0" => Ok(OrderbookPrecision::P0),
            "P1" => Ok(OrderbookPrecision::P1),
            "P2" => Ok(OrderbookPrecision::P2),
            "P3" => Ok(OrderbookPrecision::P3),
            "P4" => Ok(OrderbookPrecision::P4),
            "R0" => Ok(OrderbookPrecision::R0),
            other => Err(SymbolError::InvalidOrderbook(format!("precision {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderbookFrequency {
    /// Realtime
    F0,
    /// Every two seconds
    F1,
}

impl OrderbookFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderbookFrequency::F0 => "F0",
            OrderbookFrequency::F1 => "F1",
        }
    }

    pub fn parse(value: &str) -> Result<Self, SymbolError> {
        match value {
            "F0" => Ok(OrderbookFrequency::F0),
            "F1" => Ok(OrderbookFrequency::F1),
            other => Err(SymbolError::InvalidOrderbook(format!("frequency {}", other))),
        }
    }
}

/// Order book subscription settings
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderbookConfiguration {
    pub pair: CurrencyPair,
    pub precision: OrderbookPrecision,
    pub frequency: OrderbookFrequency,
    pub length: u32,
}

impl OrderbookConfiguration {
    pub fn new(
        pair: CurrencyPair,
        precision: OrderbookPrecision,
        frequency: OrderbookFrequency,
        length: u32,
    ) -> Self {
        Self {
            pair,
            precision,
            frequency,
            length,
        }
    }

    /// Build from a `subscribed` book event
    ///
    /// The server sends `len` as a string; numbers are accepted too.
    pub fn from_json(event: &Value) -> Result<Self, SymbolError> {
        let symbol = str_field(event, "symbol")?;
        let precision = str_field(event, "prec")?;
        let frequency = str_field(event, "freq")?;

        let length = match event.get("len") {
            Some(Value::String(len)) => len
                .parse::<u32>()
                .map_err(|_| SymbolError::InvalidOrderbook(format!("length {}", len)))?,
            Some(Value::Number(len)) => len
                .as_u64()
                .and_then(|len| u32::try_from(len).ok())
                .ok_or_else(|| SymbolError::InvalidOrderbook(format!("length {}", len)))?,
            _ => return Err(SymbolError::MissingField("len")),
        };

        Ok(Self {
            pair: CurrencyPair::from_symbol_string(symbol)?,
            precision: OrderbookPrecision::parse(precision)?,
            frequency: OrderbookFrequency::parse(frequency)?,
            length,
        })
    }
}

impl fmt::Display for OrderbookConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "book:{}:{}:{}:{}",
            self.pair,
            self.precision.as_str(),
            self.frequency.as_str(),
            self.length
        )
    }
}

// =============================================================================
// Stream symbol
// =============================================================================

/// Discriminant of [`StreamSymbol`], used to group resubscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StreamKind {
    Ticker,
    Candles,
    Orderbook,
}

/// Application-level subscription key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamSymbol {
    Ticker(CurrencyPair),
    Candles(CandlestickSymbol),
    Orderbook(OrderbookConfiguration),
}

impl StreamSymbol {
    pub fn kind(&self) -> StreamKind {
        match self {
            StreamSymbol::Ticker(_) => StreamKind::Ticker,
            StreamSymbol::Candles(_) => StreamKind::Candles,
            StreamSymbol::Orderbook(_) => StreamKind::Orderbook,
        }
    }

    /// Build the symbol described by a `subscribed` control event
    pub fn from_subscribed_event(event: &Value) -> Result<Self, SymbolError> {
        match str_field(event, "channel")? {
            "ticker" => Ok(StreamSymbol::Ticker(CurrencyPair::from_symbol_string(
                str_field(event, "symbol")?,
            )?)),
            "candles" => Ok(StreamSymbol::Candles(CandlestickSymbol::from_key(
                str_field(event, "key")?,
            )?)),
            "book" => Ok(StreamSymbol::Orderbook(OrderbookConfiguration::from_json(
                event,
            )?)),
            other => Err(SymbolError::UnknownChannel(other.to_string())),
        }
    }
}

impl fmt::Display for StreamSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSymbol::Ticker(pair) => write!(f, "ticker:{}", pair),
            StreamSymbol::Candles(candles) => write!(f, "candles:{}", candles),
            StreamSymbol::Orderbook(book) => write!(f, "{}", book),
        }
    }
}

impl From<CurrencyPair> for StreamSymbol {
    fn from(pair: CurrencyPair) -> Self {
        StreamSymbol::Ticker(pair)
    }
}

impl From<CandlestickSymbol> for StreamSymbol {
    fn from(symbol: CandlestickSymbol) -> Self {
        StreamSymbol::Candles(symbol)
    }
}

impl From<OrderbookConfiguration> for StreamSymbol {
    fn from(config: OrderbookConfiguration) -> Self {
        StreamSymbol::Orderbook(config)
    }
}

fn str_field<'a>(event: &'a Value, field: &'static str) -> Result<&'a str, SymbolError> {
    event
        .get(field)
        .and_then(Value::as_str)
        .ok_or(SymbolError::MissingField(field))
}
