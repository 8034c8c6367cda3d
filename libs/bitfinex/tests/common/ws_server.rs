//! Local websocket endpoint speaking enough of the public protocol for
//! end-to-end tests over the real transport
//!
//! Answers `ping` with `pong` and confirms ticker subscriptions with
//! increasing channel ids starting at 17.

use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::net::TcpListener;
use tokio::sync::Notify;

pub struct ExchangeServer {
    addr: SocketAddr,
    shutdown: Arc<Notify>,
    pings: Arc<AtomicUsize>,
}

impl ExchangeServer {
    pub fn start() -> Self {
        let shutdown = Arc::new(Notify::new());
        let pings = Arc::new(AtomicUsize::new(0));
        let next_channel = Arc::new(AtomicU32::new(17));
        let (addr_tx, addr_rx) = std::sync::mpsc::channel();

        let server_shutdown = Arc::clone(&shutdown);
        let server_pings = Arc::clone(&pings);
        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async move {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                addr_tx.send(listener.local_addr().unwrap()).unwrap();

                loop {
                    tokio::select! {
                        result = listener.accept() => {
                            let Ok((stream, _)) = result else { break };
                            let shutdown = Arc::clone(&server_shutdown);
                            let pings = Arc::clone(&server_pings);
                            let next_channel = Arc::clone(&next_channel);
                            tokio::spawn(async move {
                                handle_connection(stream, shutdown, pings, next_channel).await;
                            });
                        }
                        _ = server_shutdown.notified() => break,
                    }
                }
            });
        });

        let addr = addr_rx.recv().unwrap();
        Self {
            addr,
            shutdown,
            pings,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}

impl Drop for ExchangeServer {
    fn drop(&mut self) {
        self.shutdown.notify_waiters();
    }
}

fn reply_to(text: &str, pings: &AtomicUsize, next_channel: &AtomicU32) -> Option<String> {
    let request: Value = serde_json::from_str(text).ok()?;
    match request.get("event")?.as_str()? {
        "ping" => {
            pings.fetch_add(1, Ordering::SeqCst);
            Some(json!({"event": "pong", "ts": 0}).to_string())
        }
        "subscribe" if request.get("channel")?.as_str()? == "ticker" => {
            let symbol = request.get("symbol")?.as_str()?;
            Some(
                json!({
                    "event": "subscribed",
                    "channel": "ticker",
                    "symbol": symbol,
                    "pair": symbol.trim_start_matches('t'),
                    "chanId": next_channel.fetch_add(1, Ordering::SeqCst),
                })
                .to_string(),
            )
        }
        _ => None,
    }
}

async fn handle_connection(
    stream: tokio::net::TcpStream,
    shutdown: Arc<Notify>,
    pings: Arc<AtomicUsize>,
    next_channel: Arc<AtomicU32>,
) {
    use futures::{SinkExt, StreamExt};
    use tokio_tungstenite::{accept_async, tungstenite::Message};

    let Ok(ws_stream) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws_stream.split();

    let info = json!({"event": "info", "version": 2}).to_string();
    if write.send(Message::text(info)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = reply_to(text.as_str(), &pings, &next_channel) {
                            if write.send(Message::text(reply)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = shutdown.notified() => break,
        }
    }
}
