//! Account channel (channel 0) handlers, selected by the frame's tag

use super::{ApiHandler, HandlerError};
use crate::managers::PositionChange;
use crate::session::SessionContext;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error, info};

pub(crate) fn handler_table() -> HashMap<&'static str, Box<dyn ApiHandler>> {
    let mut table: HashMap<&'static str, Box<dyn ApiHandler>> = HashMap::new();

    table.insert("hb", Box::new(HeartbeatHandler));

    table.insert("ps", Box::new(PositionHandler::new(PositionChange::Snapshot)));
    table.insert("pn", Box::new(PositionHandler::new(PositionChange::Update)));
    table.insert("pu", Box::new(PositionHandler::new(PositionChange::Update)));
    table.insert("pc", Box::new(PositionHandler::new(PositionChange::Close)));

    table.insert("ws", Box::new(WalletHandler { snapshot: true }));
    table.insert("wu", Box::new(WalletHandler { snapshot: false }));

    table.insert("os", Box::new(OrderHandler { snapshot: true }));
    table.insert("on", Box::new(OrderHandler { snapshot: false }));
    table.insert("ou", Box::new(OrderHandler { snapshot: false }));
    table.insert("oc", Box::new(OrderHandler { snapshot: false }));

    table.insert("n", Box::new(NotificationHandler));

    // Trades and funding are not tracked
    for tag in ["te", "tu", "fos", "fcs", "fls", "ats"] {
        table.insert(tag, Box::new(IgnoredHandler));
    }

    table
}

pub struct HeartbeatHandler;

impl ApiHandler for HeartbeatHandler {
    fn handle(&self, _context: &SessionContext, _payload: &Value) -> Result<(), HandlerError> {
        debug!("[Session] Account channel heartbeat");
        Ok(())
    }
}

/// Position snapshot and updates, applied on the worker pool
///
/// The snapshot signals readiness once it has been applied.
pub struct PositionHandler {
    change: PositionChange,
}

impl PositionHandler {
    pub fn new(change: PositionChange) -> Self {
        Self { change }
    }
}

impl ApiHandler for PositionHandler {
    fn handle(&self, context: &SessionContext, payload: &Value) -> Result<(), HandlerError> {
        let barrier = match self.change {
            PositionChange::Snapshot => context.readiness(),
            _ => None,
        };

        context.positions.submit(self.change, payload, move || {
            if let Some(barrier) = barrier {
                barrier.count_down();
            }
        })?;
        Ok(())
    }
}

pub struct WalletHandler {
    snapshot: bool,
}

impl ApiHandler for WalletHandler {
    fn handle(&self, context: &SessionContext, payload: &Value) -> Result<(), HandlerError> {
        if self.snapshot {
            context.wallets.handle_snapshot(payload)?;
            info!("[Session] Wallet snapshot applied");
            context.signal_ready();
        } else {
            context.wallets.handle_update(payload)?;
        }
        Ok(())
    }
}

pub struct OrderHandler {
    snapshot: bool,
}

impl ApiHandler for OrderHandler {
    fn handle(&self, context: &SessionContext, payload: &Value) -> Result<(), HandlerError> {
        if self.snapshot {
            context.orders.handle_snapshot(payload)?;
            context.signal_ready();
        } else {
            context.orders.handle_update(payload)?;
        }
        Ok(())
    }
}

/// `[MTS, TYPE, MESSAGE_ID, null, NOTIFY_INFO, CODE, STATUS, TEXT]`
pub struct NotificationHandler;

impl ApiHandler for NotificationHandler {
    fn handle(&self, _context: &SessionContext, payload: &Value) -> Result<(), HandlerError> {
        let fields = payload
            .as_array()
            .ok_or_else(|| HandlerError::Failed(format!("notification is not an array: {}", payload)))?;

        let kind = fields.get(1).and_then(Value::as_str).unwrap_or("?");
        let status = fields.get(6).and_then(Value::as_str).unwrap_or("?");
        let text = fields.get(7).and_then(Value::as_str).unwrap_or("");

        if status == "ERROR" || status == "FAILURE" {
            error!("[Session] Notification {} {}: {}", kind, status, text);
        } else {
            info!("[Session] Notification {} {}: {}", kind, status, text);
        }
        Ok(())
    }
}

pub struct IgnoredHandler;

impl ApiHandler for IgnoredHandler {
    fn handle(&self, _context: &SessionContext, _payload: &Value) -> Result<(), HandlerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_covers_account_tags() {
        let table = handler_table();
        for tag in [
            "hb", "ps", "pn", "pu", "pc", "ws", "wu", "os", "on", "ou", "oc", "n", "te", "tu",
            "fos", "fcs", "fls", "ats",
        ] {
            assert!(table.contains_key(tag), "missing handler for {}", tag);
        }
    }

    #[test]
    fn test_snapshots_signal_readiness() {
        let context = SessionContext::new(1);
        let barrier = context.arm_readiness(3);

        OrderHandler { snapshot: true }
            .handle(&context, &json!([]))
            .unwrap();
        WalletHandler { snapshot: true }
            .handle(&context, &json!([["exchange", "USD", 10.0, 0, 10.0]]))
            .unwrap();
        assert_eq!(barrier.remaining(), 1);

        // Updates never count
        WalletHandler { snapshot: false }
            .handle(&context, &json!(["exchange", "USD", 5.0, 0, 5.0]))
            .unwrap();
        assert_eq!(barrier.remaining(), 1);
    }

    #[test]
    fn test_position_snapshot_signals_after_apply() {
        let context = SessionContext::new(1);
        let barrier = context.arm_readiness(1);

        PositionHandler::new(PositionChange::Snapshot)
            .handle(
                &context,
                &json!([["tBTCUSD", "ACTIVE", 1.0, 100.0, 0.0, 0, null, null, null, null]]),
            )
            .unwrap();

        assert_eq!(
            barrier.wait(std::time::Duration::from_secs(5)),
            crate::session::ReadinessOutcome::Ready
        );
        assert_eq!(context.positions.positions().len(), 1);
    }

    #[test]
    fn test_malformed_notification() {
        let context = SessionContext::new(1);
        assert!(NotificationHandler.handle(&context, &json!("oops")).is_err());
        assert!(NotificationHandler
            .handle(
                &context,
                &json!([0, "on-req", null, null, [], null, "ERROR", "Invalid price"])
            )
            .is_ok());
    }
}
