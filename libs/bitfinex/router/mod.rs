//! Inbound frame routing
//!
//! ```text
//! text frame ──┬─ {"event": ..}  ──> event handler (by discriminator)
//!              └─ [chanId, ..]   ─┬─ 0   ──> account handler (by tag)
//!                                 └─ id  ──> registry ──> stream handler (by symbol variant)
//! ```
//!
//! Both tag tables are built once in [`FrameRouter::new`]. Nothing in here
//! blocks or returns an error to the transport: malformed frames, unknown
//! tags and handler failures are logged and dropped.

pub mod account;
pub mod channels;
pub mod events;

pub use channels::{ChannelHandler, StreamHandlers};

use crate::managers::PayloadError;
use crate::session::SessionContext;
use crate::symbols::{StreamSymbol, SymbolError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Malformed payload: {0}")]
    Payload(#[from] PayloadError),

    #[error("Invalid symbol: {0}")]
    Symbol(#[from] SymbolError),

    #[error("Missing field '{0}'")]
    MissingField(&'static str),

    #[error("{0}")]
    Failed(String),
}

/// Handler for one control-event discriminator or one account-channel tag
pub trait ApiHandler: Send + Sync {
    /// `data` is the event object, or the payload element of a channel-0 frame
    fn handle(&self, context: &SessionContext, data: &Value) -> Result<(), HandlerError>;
}

pub struct FrameRouter {
    context: Arc<SessionContext>,
    event_handlers: HashMap<&'static str, Box<dyn ApiHandler>>,
    account_handlers: HashMap<&'static str, Box<dyn ApiHandler>>,
    stream_handlers: StreamHandlers,
}

impl FrameRouter {
    pub fn new(context: Arc<SessionContext>, stream_handlers: StreamHandlers) -> Self {
        Self {
            context,
            event_handlers: events::handler_table(),
            account_handlers: account::handler_table(),
            stream_handlers,
        }
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    /// Route one inbound text frame
    pub fn route(&self, text: &str) {
        debug!("[Router] Got message: {}", text);

        let frame: Value = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                error!("[Router] Dropping unparsable frame ({}): {}", e, text);
                return;
            }
        };

        self.context.state.mark_activity();

        match frame {
            Value::Object(_) => self.route_event(&frame, text),
            Value::Array(items) => self.route_channel(&items, text),
            _ => error!("[Router] Got unknown callback: {}", text),
        }
    }

    fn route_event(&self, event: &Value, text: &str) {
        let Some(name) = event.get("event").and_then(Value::as_str) else {
            error!("[Router] Event without discriminator: {}", text);
            return;
        };

        match self.event_handlers.get(name) {
            Some(handler) => {
                if let Err(e) = handler.handle(&self.context, event) {
                    error!("[Router] Event '{}' handler failed: {} ({})", name, e, text);
                }
            }
            None => warn!("[Router] Unknown event: {}", text),
        }
    }

    fn route_channel(&self, items: &[Value], text: &str) {
        let Some(channel_id) = items.first().and_then(Value::as_u64) else {
            error!("[Router] Channel frame without channel id: {}", text);
            return;
        };

        if channel_id == 0 {
            self.route_account(items, text);
            return;
        }

        let symbol = u32::try_from(channel_id)
            .ok()
            .and_then(|id| self.context.registry.resolve(id));
        let Some(symbol) = symbol else {
            error!(
                "[Router] Unable to determine symbol for channel {}, data: {}",
                channel_id, text
            );
            return;
        };

        match items.get(1) {
            Some(Value::String(marker)) if marker == "hb" => {
                self.context.quotes.update_channel_heartbeat(&symbol);
            }
            Some(payload @ Value::Array(_)) => self.dispatch_stream(&symbol, payload, text),
            _ => error!("[Router] Unable to process: {}", text),
        }
    }

    fn route_account(&self, items: &[Value], text: &str) {
        if text.contains("ERROR") {
            error!("[Router] Got error message: {}", text);
        }

        let Some(tag) = items.get(1).and_then(Value::as_str) else {
            error!("[Router] Account frame without tag: {}", text);
            return;
        };

        let Some(handler) = self.account_handlers.get(tag) else {
            warn!("[Router] No handler for account tag '{}': {}", tag, text);
            return;
        };

        let payload = items.get(2).unwrap_or(&Value::Null);
        if let Err(e) = handler.handle(&self.context, payload) {
            error!("[Router] Account tag '{}' handler failed: {} ({})", tag, e, text);
        }
    }

    fn dispatch_stream(&self, symbol: &StreamSymbol, payload: &Value, text: &str) {
        let handlers = &self.stream_handlers;
        let result = match symbol {
            StreamSymbol::Ticker(pair) => handlers.ticker.handle(&self.context, pair, payload),
            StreamSymbol::Candles(candles) => {
                handlers.candles.handle(&self.context, candles, payload)
            }
            StreamSymbol::Orderbook(config) => {
                handlers.orderbook.handle(&self.context, config, payload)
            }
        };

        if let Err(e) = result {
            error!("[Router] {} handler failed: {} ({})", symbol, e, text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::CurrencyPair;

    fn router() -> FrameRouter {
        FrameRouter::new(Arc::new(SessionContext::new(1)), StreamHandlers::default())
    }

    #[test]
    fn test_subscribed_binds_channel() {
        let router = router();
        router.route(r#"{"event":"subscribed","channel":"ticker","symbol":"tBTCUSD","chanId":5}"#);

        assert_eq!(
            router.context().registry.resolve(5),
            Some(StreamSymbol::Ticker(CurrencyPair::new("BTC", "USD")))
        );

        router.route(r#"{"event":"unsubscribed","status":"OK","chanId":5}"#);
        assert!(router.context().registry.is_empty());
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let router = router();
        for frame in [
            "",
            "not json",
            "[",
            "42",
            "[]",
            "[\"x\"]",
            "[0]",
            "[0, 17]",
            "[99, [1,2,3]]",
            "{}",
            r#"{"event":"martian"}"#,
            r#"{"event":"subscribed","channel":"ticker"}"#,
            r#"[0,"zz",[]]"#,
        ] {
            router.route(frame);
        }

        router.route(r#"{"event":"subscribed","channel":"ticker","symbol":"tETHUSD","chanId":9}"#);
        assert_eq!(router.context().registry.len(), 1);
    }
}
