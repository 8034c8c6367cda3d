//! Common test utilities for session integration tests
//!
//! `MockTransport` stands in for the websocket: it records every frame the
//! session sends and answers through a scripted responder. Replies are
//! delivered on a separate dispatch thread, like the real transport does.

#![allow(dead_code)]

pub mod ws_server;

use crossbeam_channel::{unbounded, Sender};
use hypersockets::{
    ConsumerId, ConsumerSet, HyperSocketError, InboundConsumer, Result, Transport,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

pub type Responder = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

pub struct MockTransport {
    consumers: Arc<ConsumerSet>,
    inbound_tx: Sender<String>,
    open: AtomicBool,
    opens: AtomicUsize,
    fail_open: AtomicBool,
    sent: Mutex<Vec<String>>,
    responder: Mutex<Option<Responder>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        let consumers = Arc::new(ConsumerSet::new());
        let (inbound_tx, inbound_rx) = unbounded::<String>();

        let dispatch_consumers = Arc::clone(&consumers);
        thread::spawn(move || {
            while let Ok(text) = inbound_rx.recv() {
                verbose_println!("mock <- {}", text);
                dispatch_consumers.dispatch(&text);
            }
        });

        Arc::new(Self {
            consumers,
            inbound_tx,
            open: AtomicBool::new(false),
            opens: AtomicUsize::new(0),
            fail_open: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            responder: Mutex::new(None),
        })
    }

    /// Answer every sent frame with the frames `responder` returns
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
    {
        *self.responder.lock() = Some(Arc::new(responder));
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Deliver `text` as if the server had sent it
    pub fn inject(&self, text: impl Into<String>) {
        let _ = self.inbound_tx.send(text.into());
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn sent_containing(&self, needle: &str) -> usize {
        self.sent.lock().iter().filter(|text| text.contains(needle)).count()
    }

    /// Poll until a sent frame contains `needle`
    pub fn wait_for_sent(&self, needle: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.sent_containing(needle) > 0 {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }
}

impl Transport for MockTransport {
    fn open(&self, url: &str) -> Result<()> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(HyperSocketError::WebSocket(format!("refused: {}", url)));
        }
        if self.open.swap(true, Ordering::SeqCst) {
            return Err(HyperSocketError::InvalidState("already open".to_string()));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn send(&self, text: &str) -> Result<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(HyperSocketError::NotConnected);
        }
        verbose_println!("mock -> {}", text);
        self.sent.lock().push(text.to_string());

        let responder = self.responder.lock().clone();
        if let Some(responder) = responder {
            for reply in responder(text) {
                self.inject(reply);
            }
        }
        Ok(())
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn add_consumer(&self, consumer: InboundConsumer) -> ConsumerId {
        self.consumers.add(consumer)
    }

    fn remove_consumer(&self, id: ConsumerId) -> bool {
        self.consumers.remove(id)
    }
}

pub fn auth_ok() -> String {
    r#"{"event":"auth","status":"OK","chanId":0,"userId":1}"#.to_string()
}

pub fn subscribed_ticker(symbol: &str, channel_id: u32) -> String {
    format!(
        r#"{{"event":"subscribed","channel":"ticker","symbol":"{}","pair":"{}","chanId":{}}}"#,
        symbol,
        &symbol[1..],
        channel_id
    )
}

/// Account snapshots sent by the server after a successful auth
pub fn account_snapshots() -> Vec<String> {
    vec![
        r#"[0,"ps",[]]"#.to_string(),
        r#"[0,"ws",[["exchange","USD",100.0,0,100.0]]]"#.to_string(),
        r#"[0,"os",[]]"#.to_string(),
    ]
}
