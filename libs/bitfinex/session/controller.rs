use super::context::SessionContext;
use super::heartbeat::{HeartbeatMonitor, HeartbeatTarget};
use super::readiness::ReadinessOutcome;
use super::state::SessionPhase;
use crate::commands::{
    subscribe_command, ApiCommand, AuthCommand, CancelOrderCommand, CancelOrderGroupCommand,
    Credentials, ExchangeOrder, OrderCommand, PingCommand, UnsubscribeChannelCommand,
};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::managers::{OrderManager, OrderbookManager, PositionManager, QuoteManager, Wallet};
use crate::registry::ChannelRegistry;
use crate::router::{FrameRouter, StreamHandlers};
use crate::symbols::StreamSymbol;
use hypersockets::{ConsumerId, HyperSocketError, Transport, TransportConfig, WebSocketTransport};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Persistent, self-healing session with the exchange
///
/// All calls block the calling thread. `connect` and `reconnect` wait on the
/// readiness barrier (and, for `reconnect`, on resubscription); `close` from
/// any thread releases those waits.
pub struct BitfinexSession {
    inner: Arc<SessionInner>,
}

pub struct BitfinexSessionBuilder {
    config: SessionConfig,
    credentials: Option<Credentials>,
    transport: Option<Arc<dyn Transport>>,
    stream_handlers: StreamHandlers,
}

impl Default for BitfinexSessionBuilder {
    fn default() -> Self {
        Self {
            config: SessionConfig::default(),
            credentials: None,
            transport: None,
            stream_handlers: StreamHandlers::default(),
        }
    }
}

impl BitfinexSessionBuilder {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Authenticate with these credentials; without them the session is public
    pub fn credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Use a custom transport instead of a websocket
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn stream_handlers(mut self, handlers: StreamHandlers) -> Self {
        self.stream_handlers = handlers;
        self
    }

    pub fn build(self) -> Result<BitfinexSession> {
        self.config.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(WebSocketTransport::new(
                TransportConfig::default().with_connect_timeout(self.config.connect_timeout()),
            )?),
        };

        let context = Arc::new(SessionContext::new(self.config.worker_threads));
        let router = Arc::new(FrameRouter::new(Arc::clone(&context), self.stream_handlers));

        Ok(BitfinexSession {
            inner: Arc::new(SessionInner {
                config: self.config,
                credentials: self.credentials,
                transport,
                context,
                router,
                consumer: Mutex::new(None),
                heartbeat: Mutex::new(None),
                reconnect_lock: Mutex::new(()),
            }),
        })
    }
}

struct SessionInner {
    config: SessionConfig,
    credentials: Option<Credentials>,
    transport: Arc<dyn Transport>,
    context: Arc<SessionContext>,
    router: Arc<FrameRouter>,
    consumer: Mutex<Option<ConsumerId>>,
    heartbeat: Mutex<Option<HeartbeatMonitor>>,
    /// Held for the whole of a reconnect
    reconnect_lock: Mutex<()>,
}

impl BitfinexSession {
    pub fn builder() -> BitfinexSessionBuilder {
        BitfinexSessionBuilder::default()
    }

    /// Open the transport, authenticate if credentials were given, and start
    /// the heartbeat monitor
    ///
    /// A no-op when the session is already connected.
    pub fn connect(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.context.state.is_connected() {
            warn!("[Session] connect() called on a connected session");
            return Ok(());
        }

        inner.context.end_close();
        inner.establish()?;
        inner.context.state.set_phase(SessionPhase::Ready);
        info!("[Session] Ready (authenticated: {})", self.is_authenticated());

        self.start_heartbeat()
    }

    fn start_heartbeat(&self) -> Result<()> {
        let mut slot = self.inner.heartbeat.lock();
        if slot.is_some() {
            return Ok(());
        }

        let monitor = HeartbeatMonitor::start(
            self.inner.config.heartbeat_interval(),
            self.inner.config.staleness_threshold(),
            Arc::downgrade(&self.inner),
        )
        .map_err(|e| {
            SessionError::Transport(HyperSocketError::InvalidState(format!(
                "Failed to start heartbeat monitor: {}",
                e
            )))
        })?;
        *slot = Some(monitor);
        Ok(())
    }

    /// Tear the session down and bring it back with the same subscriptions
    ///
    /// Returns [`SessionError::ReconnectInProgress`] when another reconnect is
    /// already running. On a resubscription timeout the registry is restored
    /// to its pre-reconnect content and the transport stays open.
    pub fn reconnect(&self) -> Result<()> {
        self.inner.reconnect()
    }

    /// Stop the heartbeat, close the transport and release blocked callers
    ///
    /// Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Encode and send `command`; failures are logged, not returned
    pub fn send_command(&self, command: &dyn ApiCommand) {
        if let Err(e) = self.inner.try_send(command) {
            error!("[Session] Got error while sending {:?}: {}", command, e);
        }
    }

    /// Count one readiness event for the connect attempt in progress
    pub fn signal_ready(&self) {
        self.inner.context.signal_ready();
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.context.state.phase()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.context.state.is_connected()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.context.state.is_authenticated()
    }

    /// Server message of the last rejected authentication, cleared by the
    /// next connect attempt
    pub fn last_auth_failure(&self) -> Option<String> {
        self.inner.context.auth_failure()
    }

    pub fn resolve_symbol(&self, channel_id: u32) -> Option<StreamSymbol> {
        self.inner.context.registry.resolve(channel_id)
    }

    pub fn channel_for(&self, symbol: &StreamSymbol) -> Option<u32> {
        self.inner.context.registry.find_channel(symbol)
    }

    pub fn is_subscribed(&self, symbol: &StreamSymbol) -> bool {
        self.channel_for(symbol).is_some()
    }

    /// Request a subscription; the channel is bound once the server confirms
    pub fn subscribe(&self, symbol: &StreamSymbol) -> Result<()> {
        if self.is_subscribed(symbol) {
            debug!("[Session] {} is already subscribed", symbol);
            return Ok(());
        }
        self.inner.try_send(&*subscribe_command(symbol))
    }

    /// Request an unsubscribe; returns whether `symbol` had a channel
    pub fn unsubscribe(&self, symbol: &StreamSymbol) -> Result<bool> {
        match self.channel_for(symbol) {
            Some(channel_id) => {
                self.inner
                    .try_send(&UnsubscribeChannelCommand::new(channel_id))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn place_order(&self, order: ExchangeOrder) -> Result<()> {
        self.require_authenticated()?;
        info!(
            "[Session] Placing order {} {} {} @ {:?}",
            order.order_type.as_str(),
            order.pair,
            order.amount,
            order.price
        );
        self.inner.try_send(&OrderCommand::new(order))
    }

    pub fn cancel_order(&self, order_id: i64) -> Result<()> {
        self.require_authenticated()?;
        info!("[Session] Cancelling order {}", order_id);
        self.inner.try_send(&CancelOrderCommand::new(order_id))
    }

    pub fn cancel_order_group(&self, group_id: i64) -> Result<()> {
        self.require_authenticated()?;
        info!("[Session] Cancelling order group {}", group_id);
        self.inner.try_send(&CancelOrderGroupCommand::new(group_id))
    }

    pub fn wallets(&self) -> Result<Vec<Wallet>> {
        self.require_authenticated()?;
        Ok(self.inner.context.wallets.wallets())
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.inner.context.registry
    }

    pub fn quotes(&self) -> &QuoteManager {
        &self.inner.context.quotes
    }

    pub fn orderbooks(&self) -> &OrderbookManager {
        &self.inner.context.orderbooks
    }

    pub fn orders(&self) -> &OrderManager {
        &self.inner.context.orders
    }

    pub fn positions(&self) -> &PositionManager {
        &self.inner.context.positions
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    fn require_authenticated(&self) -> Result<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(SessionError::Unauthenticated)
        }
    }
}

impl Drop for BitfinexSession {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl SessionInner {
    fn try_send(&self, command: &dyn ApiCommand) -> Result<()> {
        if self.context.state.phase() == SessionPhase::Disconnected {
            return Err(SessionError::NotConnected);
        }
        let text = command.encode(self.credentials.as_ref())?;
        debug!("[Session] Sending to server: {}", text);
        self.transport.send(&text)?;
        Ok(())
    }

    fn install_consumer(&self) {
        let mut consumer = self.consumer.lock();
        if consumer.is_none() {
            let router = Arc::clone(&self.router);
            *consumer = Some(
                self.transport
                    .add_consumer(Arc::new(move |text: &str| router.route(text))),
            );
        }
    }

    fn remove_consumer(&self) {
        if let Some(id) = self.consumer.lock().take() {
            self.transport.remove_consumer(id);
        }
    }

    /// Open the transport and run the readiness handshake
    ///
    /// On any failure the transport is torn down and the session left
    /// `Disconnected`.
    fn establish(&self) -> Result<()> {
        let context = &self.context;
        context.state.set_phase(SessionPhase::Connecting);

        // Armed before open so no early auth or snapshot event is missed
        let barrier = context.arm_readiness(self.config.required_ready_events());
        self.install_consumer();

        info!("[Session] Connecting to {}", self.config.url);
        if let Err(e) = self.transport.open(&self.config.url) {
            error!("[Session] Unable to open transport: {}", e);
            self.teardown();
            return Err(e.into());
        }
        context.state.mark_activity();

        if self.credentials.is_none() {
            debug!("[Session] No credentials, skipping authentication");
            context.disarm_readiness();
            return Ok(());
        }

        context.state.set_phase(SessionPhase::AuthHandshake);
        if let Err(e) = self.try_send(&AuthCommand::new()) {
            error!("[Session] Unable to send auth request: {}", e);
            self.teardown();
            return Err(e);
        }
        debug!(
            "[Session] Waiting for {} readiness events",
            barrier.required()
        );

        let outcome = barrier.wait(self.config.auth_timeout());
        context.disarm_readiness();

        let failure = match outcome {
            ReadinessOutcome::Ready => return Ok(()),
            ReadinessOutcome::Failed(reason) => SessionError::AuthenticationFailed(reason),
            ReadinessOutcome::Cancelled => SessionError::Cancelled,
            ReadinessOutcome::TimedOut { missing } => SessionError::AuthenticationTimeout {
                timeout_secs: self.config.auth_timeout_secs,
                missing,
            },
        };

        error!("[Session] Connection not ready: {}", failure);
        self.teardown();
        Err(failure)
    }

    /// Close the transport after a failed attempt, keeping the consumer
    fn teardown(&self) {
        self.context.disarm_readiness();
        self.transport.close();
        self.context.state.set_authenticated(false);
        self.context.state.set_phase(SessionPhase::Disconnected);
    }

    fn reconnect(&self) -> Result<()> {
        let Some(_guard) = self.reconnect_lock.try_lock() else {
            return Err(SessionError::ReconnectInProgress);
        };
        if self.context.is_closing() {
            return Err(SessionError::Cancelled);
        }

        info!("[Session] Performing reconnect");
        let context = &self.context;
        context.state.set_phase(SessionPhase::Reconnecting);
        context.state.set_authenticated(false);
        context.invalidate_caches();

        self.transport.close();
        self.establish()?;

        if let Err(e) = self.resubscribe() {
            context.state.set_phase(SessionPhase::Ready);
            return Err(e);
        }

        context.state.mark_activity();
        context.state.set_phase(SessionPhase::Ready);
        info!("[Session] Reconnect complete");
        Ok(())
    }

    /// Resend every subscription and wait for all of them to be confirmed
    fn resubscribe(&self) -> Result<()> {
        let registry = &self.context.registry;
        let pending = registry.snapshot_and_clear();
        let expected = pending.len();
        if expected == 0 {
            return Ok(());
        }

        for (kind, symbols) in pending.by_kind() {
            info!("[Session] Resubscribing {} {:?} channels", symbols.len(), kind);
            for symbol in symbols {
                if let Err(e) = self.try_send(&*subscribe_command(symbol)) {
                    error!("[Session] Unable to resubscribe {}: {}", symbol, e);
                }
            }
        }

        let policy = &self.config.resubscribe;
        for poll in 1..=policy.polls {
            // A close that landed before this wait started cannot interrupt it
            if self.context.is_closing() {
                registry.restore(&pending);
                return Err(SessionError::Cancelled);
            }
            if registry.wait_for_count(expected, policy.poll_interval()) {
                info!("[Session] All {} channels resubscribed", expected);
                return Ok(());
            }
            debug!(
                "[Session] Resubscribe poll {}/{}: {} of {} channels",
                poll,
                policy.polls,
                registry.len(),
                expected
            );
        }

        if self.context.is_closing() {
            registry.restore(&pending);
            return Err(SessionError::Cancelled);
        }

        let confirmed = registry.len();
        error!(
            "[Session] Resubscription failed: {} of {} channels confirmed, restoring registry",
            confirmed, expected
        );
        registry.restore(&pending);
        Err(SessionError::ResubscribeFailed { expected, confirmed })
    }

    fn close(&self) {
        let context = &self.context;
        context.begin_close();

        let monitor = self.heartbeat.lock().take();
        if let Some(monitor) = monitor {
            monitor.stop();
        }

        // Wait for a reconnect running on another thread to unwind
        let _guard = self.reconnect_lock.lock();

        if context.state.is_connected() {
            info!("[Session] Closing session");
        }
        self.remove_consumer();
        self.transport.close();
        context.disarm_readiness();
        context.state.set_authenticated(false);
        context.state.set_phase(SessionPhase::Disconnected);
    }
}

impl HeartbeatTarget for SessionInner {
    fn is_ready(&self) -> bool {
        self.context.state.phase() == SessionPhase::Ready
    }

    fn idle_for(&self) -> std::time::Duration {
        self.context.state.idle_for()
    }

    fn send_ping(&self) {
        if let Err(e) = self.try_send(&PingCommand) {
            warn!("[Heartbeat] Unable to send ping: {}", e);
        }
    }

    fn reconnect(&self) -> Result<()> {
        SessionInner::reconnect(self)
    }
}
