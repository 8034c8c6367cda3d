use std::time::Duration;

/// Configuration for [`WebSocketTransport`](crate::WebSocketTransport)
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Maximum time allowed for the TCP + WebSocket handshake
    pub connect_timeout: Duration,

    /// Maximum time `close()` waits for the close handshake before aborting the I/O task
    pub close_timeout: Duration,

    /// Worker threads for the private I/O runtime
    pub io_threads: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            close_timeout: Duration::from_secs(1),
            io_threads: 1,
        }
    }
}

impl TransportConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}
