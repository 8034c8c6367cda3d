use crate::config::TransportConfig;
use crate::connection_state::{AtomicConnectionState, ConnectionState};
use crate::consumers::ConsumerSet;
use crate::traits::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Resources belonging to one open connection
struct ActiveConnection {
    url: String,
    /// Outbound frames, drained by the I/O task
    outbound_tx: UnboundedSender<Message>,
    /// Tokio task owning the socket
    io_task: tokio::task::JoinHandle<()>,
    /// OS thread delivering inbound text to consumers
    dispatch_thread: JoinHandle<()>,
}

/// WebSocket transport with a blocking surface
///
/// Socket I/O runs on a private tokio runtime:
///
/// ```text
///   send() ──> unbounded mpsc ──> I/O task ──> socket
///                                   │
///   socket ──> I/O task ──> crossbeam channel ──> dispatch thread ──> consumers
/// ```
///
/// Consumers therefore never run on the I/O task, and a slow consumer
/// delays later frames without stalling the socket.
///
/// `open`, `send` and `close` use `Runtime::block_on` internally and must
/// not be called from inside an async context.
pub struct WebSocketTransport {
    config: TransportConfig,
    runtime: Runtime,
    state: Arc<AtomicConnectionState>,
    consumers: Arc<ConsumerSet>,
    connection: Mutex<Option<ActiveConnection>>,
}

impl WebSocketTransport {
    /// Create a closed transport with its own I/O runtime
    pub fn new(config: TransportConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.io_threads.max(1))
            .thread_name("hypersockets-io")
            .enable_all()
            .build()
            .map_err(|e| {
                HyperSocketError::Configuration(format!("Failed to build I/O runtime: {}", e))
            })?;

        Ok(Self {
            config,
            runtime,
            state: Arc::new(AtomicConnectionState::new(ConnectionState::Disconnected)),
            consumers: Arc::new(ConsumerSet::new()),
            connection: Mutex::new(None),
        })
    }

    /// Get current connection state
    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, url: &str) -> Result<()> {
        let mut connection = self.connection.lock();
        if let Some(active) = connection.as_ref() {
            return Err(HyperSocketError::InvalidState(format!(
                "transport already open to {}",
                active.url
            )));
        }

        self.state.set(ConnectionState::Connecting);
        debug!("[Transport] Connecting to {}", url);

        // The timer must be created inside the runtime
        let connect_timeout = self.config.connect_timeout;
        let handshake = self
            .runtime
            .block_on(async { tokio::time::timeout(connect_timeout, connect_async(url)).await });
        let ws_stream = match handshake {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                self.state.set(ConnectionState::Disconnected);
                return Err(HyperSocketError::WebSocket(format!(
                    "Failed to connect to {}: {}",
                    url, e
                )));
            }
            Err(_) => {
                self.state.set(ConnectionState::Disconnected);
                return Err(HyperSocketError::Timeout(format!(
                    "connect to {} after {:?}",
                    url, self.config.connect_timeout
                )));
            }
        };

        let (inbound_tx, inbound_rx) = unbounded();
        let (outbound_tx, outbound_rx) = unbounded_channel();

        self.state.set(ConnectionState::Connected);
        let io_task = self.runtime.spawn(run_connection(
            ws_stream,
            outbound_rx,
            inbound_tx,
            Arc::clone(&self.state),
        ));

        let consumers = Arc::clone(&self.consumers);
        let dispatch_thread = match thread::Builder::new()
            .name("hypersockets-dispatch".to_string())
            .spawn(move || dispatch_loop(inbound_rx, consumers))
        {
            Ok(handle) => handle,
            Err(e) => {
                io_task.abort();
                self.state.set(ConnectionState::Disconnected);
                return Err(HyperSocketError::Configuration(format!(
                    "Failed to spawn dispatch thread: {}",
                    e
                )));
            }
        };

        info!("[Transport] Connected to {}", url);
        *connection = Some(ActiveConnection {
            url: url.to_string(),
            outbound_tx,
            io_task,
            dispatch_thread,
        });

        Ok(())
    }

    fn send(&self, text: &str) -> Result<()> {
        let connection = self.connection.lock();
        let active = connection.as_ref().ok_or(HyperSocketError::NotConnected)?;

        active
            .outbound_tx
            .send(Message::Text(text.to_string()))
            .map_err(|e| HyperSocketError::ChannelSend(e.to_string()))
    }

    fn close(&self) {
        let Some(active) = self.connection.lock().take() else {
            return;
        };
        let ActiveConnection {
            url,
            outbound_tx,
            mut io_task,
            dispatch_thread,
        } = active;

        self.state.set(ConnectionState::ShuttingDown);

        // Closing the command channel makes the I/O task send a close frame and exit
        drop(outbound_tx);

        let close_timeout = self.config.close_timeout;
        let finished = self
            .runtime
            .block_on(async { tokio::time::timeout(close_timeout, &mut io_task).await.is_ok() });

        if !finished {
            warn!(
                "[Transport] Close handshake with {} exceeded {:?}, aborting I/O task",
                url, close_timeout
            );
            io_task.abort();
            let _ = self.runtime.block_on(io_task);
        }

        // The dispatch thread exits once the I/O task has dropped its sender
        if thread::current().id() == dispatch_thread.thread().id() {
            warn!("[Transport] close() called from the dispatch thread, not joining it");
        } else if dispatch_thread.join().is_err() {
            error!("[Transport] Dispatch thread panicked");
        }

        self.state.set(ConnectionState::Disconnected);
        info!("[Transport] Closed connection to {}", url);
    }

    #[inline]
    fn is_open(&self) -> bool {
        self.state.is_connected()
    }

    fn add_consumer(&self, consumer: InboundConsumer) -> ConsumerId {
        self.consumers.add(consumer)
    }

    fn remove_consumer(&self, id: ConsumerId) -> bool {
        self.consumers.remove(id)
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Socket owner: forwards inbound text and writes outbound frames
async fn run_connection(
    ws_stream: WsStream,
    mut outbound_rx: UnboundedReceiver<Message>,
    inbound_tx: Sender<String>,
    state: Arc<AtomicConnectionState>,
) {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if inbound_tx.send(text).is_err() {
                            debug!("[Transport] Dispatch channel closed, stopping reader");
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        debug!("[Transport] Ignoring binary frame ({} bytes)", data.len());
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!("[Transport] Server closed connection: {:?}", frame);
                        break;
                    }
                    // Ping/pong are answered by tungstenite itself
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("[Transport] WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        warn!("[Transport] WebSocket stream ended");
                        break;
                    }
                }
            }

            cmd = outbound_rx.recv() => {
                match cmd {
                    Some(msg) => {
                        if let Err(e) = write.send(msg).await {
                            error!("[Transport] Failed to send frame: {}", e);
                            break;
                        }
                    }
                    None => {
                        debug!("[Transport] Outbound channel closed, closing socket");
                        let _ = write.close().await;
                        break;
                    }
                }
            }
        }
    }

    // A shutdown in progress owns the final state transition
    let _ = state.compare_exchange(ConnectionState::Connected, ConnectionState::Disconnected);
    debug!("[Transport] I/O task exiting");
}

/// Deliver inbound text to consumers until the I/O task drops its sender
fn dispatch_loop(inbound_rx: Receiver<String>, consumers: Arc<ConsumerSet>) {
    while let Ok(text) = inbound_rx.recv() {
        consumers.dispatch(&text);
    }
    debug!("[Transport] Inbound channel closed, dispatch thread exiting");
}
