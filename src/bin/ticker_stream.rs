//! Ticker Stream
//!
//! Connects a session, subscribes to the ticker of every pair given on the
//! command line (default `tBTCUSD`) and logs each tick until Ctrl+C.
//!
//! Credentials are read from `BITFINEX_API_KEY` / `BITFINEX_API_SECRET`;
//! without them the session stays public.
//!
//! Usage: cargo run --bin ticker_stream -- tBTCUSD tETHUSD

use anyhow::{Context, Result};
use bitfinex_stream::bin_common::{
    load_config_from_env, parse_args, BinaryRunner, ConfigType, RunConfig, ShutdownManager,
};
use bitfinex_stream::bitfinex::logging::init_tracing;
use bitfinex_stream::bitfinex::managers::Tick;
use bitfinex_stream::bitfinex::{
    BitfinexSession, Credentials, CurrencyPair, SessionConfig, StreamSymbol,
};
use std::sync::Arc;
use tracing::{info, warn};

struct TickerStream {
    run_config: RunConfig,
    session: BitfinexSession,
    pairs: Vec<CurrencyPair>,
    shutdown: ShutdownManager,
}

impl TickerStream {
    fn log_status(&self) {
        info!(
            "[Status] phase={:?} authenticated={} channels={}",
            self.session.phase(),
            self.session.is_authenticated(),
            self.session.registry().len()
        );

        for pair in &self.pairs {
            match self.session.quotes().last_tick(pair) {
                Some(tick) => info!(
                    "[Status] {} last={} bid={} ask={}",
                    pair, tick.last_price, tick.bid, tick.ask
                ),
                None => info!("[Status] {} no tick yet", pair),
            }
        }
    }
}

impl BinaryRunner for TickerStream {
    fn run(&mut self) -> Result<()> {
        self.session.connect().context("Failed to connect session")?;

        for pair in &self.pairs {
            let label = pair.to_string();
            self.session.quotes().register_tick_callback(
                pair.clone(),
                Arc::new(move |tick: &Tick| {
                    info!(
                        "[Tick] {} last={} bid={} ask={} vol={}",
                        label, tick.last_price, tick.bid, tick.ask, tick.volume
                    );
                }),
            );

            self.session
                .subscribe(&StreamSymbol::Ticker(pair.clone()))
                .with_context(|| format!("Failed to subscribe to {}", pair))?;
        }

        while self.shutdown.is_running() {
            self.shutdown
                .interruptible_sleep(self.run_config.status_interval());
            if self.shutdown.is_running() {
                self.log_status();
            }
        }

        self.session.close();
        Ok(())
    }

    fn config(&self) -> &RunConfig {
        &self.run_config
    }
}

fn main() -> Result<()> {
    let config_path = load_config_from_env(ConfigType::Session);
    let config = if config_path.exists() {
        SessionConfig::load(&config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?
    } else {
        SessionConfig::default()
    };

    init_tracing(&config.log_level);
    if !config_path.exists() {
        warn!(
            "Config {} not found, using defaults",
            config_path.display()
        );
    }
    config.log();

    let args = parse_args();
    let pairs = if args.is_empty() {
        vec![CurrencyPair::new("BTC", "USD")]
    } else {
        args.iter()
            .map(|arg| CurrencyPair::from_symbol_string(arg))
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Invalid pair argument")?
    };

    let credentials = Credentials::from_env();
    if credentials.is_none() {
        info!("No API credentials found, running a public session");
    }

    let session = BitfinexSession::builder()
        .config(config)
        .credentials(credentials)
        .build()
        .context("Failed to build session")?;

    let shutdown = ShutdownManager::new();
    shutdown.spawn_signal_handler();

    let mut app = TickerStream {
        run_config: RunConfig::new("Ticker Stream"),
        session,
        pairs,
        shutdown,
    };
    app.execute()
}
