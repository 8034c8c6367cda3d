//! Control events (`{"event": ...}` frames)

use super::{ApiHandler, HandlerError};
use crate::session::SessionContext;
use crate::symbols::StreamSymbol;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

pub(crate) fn handler_table() -> HashMap<&'static str, Box<dyn ApiHandler>> {
    let mut table: HashMap<&'static str, Box<dyn ApiHandler>> = HashMap::new();
    table.insert("info", Box::new(InfoHandler));
    table.insert("subscribed", Box::new(SubscribedHandler));
    table.insert("unsubscribed", Box::new(UnsubscribedHandler));
    table.insert("pong", Box::new(PongHandler));
    table.insert("auth", Box::new(AuthHandler));
    table.insert("error", Box::new(ErrorHandler));
    table
}

fn channel_id(event: &Value) -> Result<u32, HandlerError> {
    event
        .get("chanId")
        .and_then(Value::as_u64)
        .and_then(|id| u32::try_from(id).ok())
        .ok_or(HandlerError::MissingField("chanId"))
}

/// Server greeting and maintenance notices
pub struct InfoHandler;

impl ApiHandler for InfoHandler {
    fn handle(&self, _context: &SessionContext, event: &Value) -> Result<(), HandlerError> {
        debug!("[Session] Info event: {}", event);
        Ok(())
    }
}

/// Subscription confirmed: bind the channel id
pub struct SubscribedHandler;

impl ApiHandler for SubscribedHandler {
    fn handle(&self, context: &SessionContext, event: &Value) -> Result<(), HandlerError> {
        let channel_id = channel_id(event)?;
        let symbol = StreamSymbol::from_subscribed_event(event)?;

        info!("[Session] Registering {} on channel {}", symbol, channel_id);
        context.registry.bind(channel_id, symbol);
        Ok(())
    }
}

pub struct UnsubscribedHandler;

impl ApiHandler for UnsubscribedHandler {
    fn handle(&self, context: &SessionContext, event: &Value) -> Result<(), HandlerError> {
        let channel_id = channel_id(event)?;

        match context.registry.unbind(channel_id) {
            Some(symbol) => {
                info!("[Session] Channel {} ({}) is unsubscribed", channel_id, symbol);
                context.quotes.invalidate_ticker_heartbeat(&symbol);
            }
            None => warn!("[Session] Unsubscribed unknown channel {}", channel_id),
        }
        Ok(())
    }
}

pub struct PongHandler;

impl ApiHandler for PongHandler {
    fn handle(&self, context: &SessionContext, _event: &Value) -> Result<(), HandlerError> {
        context.state.mark_activity();
        Ok(())
    }
}

/// Authentication result
///
/// Success counts as one readiness event. A rejection fails the pending
/// barrier immediately.
pub struct AuthHandler;

impl ApiHandler for AuthHandler {
    fn handle(&self, context: &SessionContext, event: &Value) -> Result<(), HandlerError> {
        let status = event
            .get("status")
            .and_then(Value::as_str)
            .ok_or(HandlerError::MissingField("status"))?;

        info!("[Session] Authentication callback state {}", status);

        if status == "OK" {
            context.state.set_authenticated(true);
            context.signal_ready();
        } else {
            context.state.set_authenticated(false);
            let reason = event
                .get("msg")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("status {}", status));
            error!("[Session] Unable to authenticate: {}", event);
            context.record_auth_failure(reason);
        }
        Ok(())
    }
}

pub struct ErrorHandler;

impl ApiHandler for ErrorHandler {
    fn handle(&self, _context: &SessionContext, event: &Value) -> Result<(), HandlerError> {
        let code = event.get("code").cloned().unwrap_or(Value::Null);
        let msg = event
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or("<no message>");
        error!("[Session] Server error {}: {}", code, msg);
        Ok(())
    }
}
