//! Integration tests: frame routing with injected stream handlers

use bitfinex::router::HandlerError;
use bitfinex::session::SessionContext;
use bitfinex::{
    CandlestickSymbol, ChannelHandler, CurrencyPair, FrameRouter, OrderbookConfiguration,
    StreamHandlers, StreamSymbol,
};
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::Value;
use std::sync::Arc;

/// Records every call it receives
#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<(String, Value)>>,
    fail: bool,
}

impl Recorder {
    fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn count(&self) -> usize {
        self.calls.lock().len()
    }

    fn record(&self, symbol: String, payload: &Value) -> Result<(), HandlerError> {
        self.calls.lock().push((symbol, payload.clone()));
        if self.fail {
            return Err(HandlerError::Failed("handler exploded".to_string()));
        }
        Ok(())
    }
}

impl ChannelHandler<CurrencyPair> for Recorder {
    fn handle(
        &self,
        _context: &SessionContext,
        pair: &CurrencyPair,
        payload: &Value,
    ) -> Result<(), HandlerError> {
        self.record(pair.to_string(), payload)
    }
}

impl ChannelHandler<CandlestickSymbol> for Recorder {
    fn handle(
        &self,
        _context: &SessionContext,
        symbol: &CandlestickSymbol,
        payload: &Value,
    ) -> Result<(), HandlerError> {
        self.record(symbol.to_string(), payload)
    }
}

impl ChannelHandler<OrderbookConfiguration> for Recorder {
    fn handle(
        &self,
        _context: &SessionContext,
        config: &OrderbookConfiguration,
        payload: &Value,
    ) -> Result<(), HandlerError> {
        self.record(config.to_string(), payload)
    }
}

fn router_with(recorder: Arc<Recorder>) -> FrameRouter {
    let handlers = StreamHandlers::default()
        .with_ticker(recorder.clone())
        .with_candles(recorder.clone())
        .with_orderbook(recorder);
    FrameRouter::new(Arc::new(SessionContext::new(1)), handlers)
}

#[test]
fn test_heartbeat_updates_liveness_without_handler() {
    let recorder = Arc::new(Recorder::default());
    let router = router_with(Arc::clone(&recorder));

    router.route(r#"{"event":"subscribed","channel":"ticker","symbol":"tBTCUSD","chanId":5}"#);
    let btc = StreamSymbol::Ticker(CurrencyPair::new("BTC", "USD"));
    assert_eq!(router.context().registry.resolve(5), Some(btc.clone()));

    router.route(r#"[5,"hb"]"#);
    assert_eq!(recorder.count(), 0);
    assert!(router.context().quotes.last_heartbeat(&btc).is_some());
}

#[test]
fn test_each_variant_reaches_its_handler() {
    let recorder = Arc::new(Recorder::default());
    let router = router_with(Arc::clone(&recorder));

    router.route(r#"{"event":"subscribed","channel":"ticker","symbol":"tBTCUSD","chanId":1}"#);
    router.route(r#"{"event":"subscribed","channel":"candles","key":"trade:1m:tETHUSD","chanId":2}"#);
    router.route(
        r#"{"event":"subscribed","channel":"book","symbol":"tBTCUSD","prec":"P0","freq":"F0","len":"25","chanId":3}"#,
    );

    router.route(r#"[1,[1,2,3,4,5,6,7,8,9,10]]"#);
    router.route(r#"[2,[[1000,1,2,3,4,5]]]"#);
    router.route(r#"[3,[100.0,1,0.5]]"#);

    let calls = recorder.calls.lock();
    assert_eq!(calls.len(), 3);
    assert!(calls[0].0.contains("BTC"));
    assert!(calls[1].0.contains("1m"));
    assert!(calls[2].0.starts_with("book"));
}

#[test]
fn test_failing_handler_does_not_stop_routing() {
    let recorder = Arc::new(Recorder::failing());
    let router = router_with(Arc::clone(&recorder));

    router.route(r#"{"event":"subscribed","channel":"ticker","symbol":"tBTCUSD","chanId":1}"#);
    router.route(r#"[1,[1,2,3]]"#);
    router.route(r#"[1,[4,5,6]]"#);

    assert_eq!(recorder.count(), 2);
}

#[test]
fn test_unresolved_channel_is_dropped() {
    let recorder = Arc::new(Recorder::default());
    let router = router_with(Arc::clone(&recorder));

    router.route(r#"[77,[1,2,3]]"#);
    router.route(r#"[77,"hb"]"#);
    assert_eq!(recorder.count(), 0);
}

#[test]
fn test_unknown_account_tags_and_error_frames() {
    let router = router_with(Arc::new(Recorder::default()));

    router.route(r#"[0,"hb"]"#);
    router.route(r#"[0,"bu",[1,2]]"#);
    router.route(r#"[0,"n",[0,"on-req",null,null,[],null,"ERROR","Invalid order"]]"#);
    router.route(r#"[0,"te",[1,"tBTCUSD",0,1,1]]"#);
    router.route(r#"{"event":"error","msg":"subscribe: dup","code":10301}"#);
    router.route(r#"{"event":"info","version":2}"#);

    assert!(router.context().registry.is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Arbitrary garbage never breaks the next valid frame
    #[test]
    fn prop_router_survives_garbage(frames in proptest::collection::vec(".{0,40}", 1..20)) {
        let recorder = Arc::new(Recorder::default());
        let router = router_with(Arc::clone(&recorder));

        for frame in &frames {
            router.route(frame);
        }

        router.route(r#"{"event":"subscribed","channel":"ticker","symbol":"tXRPUSD","chanId":4242}"#);
        prop_assert_eq!(
            router.context().registry.resolve(4242),
            Some(StreamSymbol::Ticker(CurrencyPair::new("XRP", "USD")))
        );
    }

    /// Truncated array frames are dropped without panicking
    #[test]
    fn prop_router_survives_truncated_arrays(id in 0u64..10, cut in 0usize..30) {
        let router = router_with(Arc::new(Recorder::default()));
        let full = format!(r#"[{},[1.0,2.0,3.0,4.0,5.0,6.0,7.0]]"#, id);
        let cut = cut.min(full.len());
        router.route(&full[..cut]);
        router.route(&format!(r#"[{},"hb"]"#, id));
    }
}
