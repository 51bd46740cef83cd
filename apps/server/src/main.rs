//! Gemwatch - Solana new-token tracker
//!
//! Posts newly discovered tokens to a Telegram channel, alerts when a posted
//! token multiplies in value, and sends a weekly performance summary.

mod config;
mod liveness;

use chrono::Utc;
use clap::Parser;
use config::{AppConfig, SourceKind};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use gemwatch_alerts::TelegramNotifier;
use gemwatch_core::TrackerStore;
use gemwatch_engine::{Scheduler, Tracker, WeeklyGate};
use gemwatch_feeds::{
    DexscreenerClient, DexscreenerConfig, FeedError, HeliusConfig, HeliusSource, TokenSource,
};

/// Gemwatch CLI
#[derive(Parser, Debug)]
#[command(name = "gemwatch")]
#[command(about = "Solana new-token tracker with Telegram alerts", long_about = None)]
struct Args {
    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Port for the liveness endpoint
    #[arg(short, long, env = "PORT", default_value_t = 10000)]
    port: u16,

    /// Token discovery source
    #[arg(short, long, env = "TOKEN_SOURCE", value_enum, default_value_t = SourceKind::Helius)]
    source: SourceKind,

    /// Seconds between discovery sweeps
    #[arg(long, env = "DISCOVERY_INTERVAL_SECS", default_value_t = 60)]
    discovery_interval: u64,

    /// Seconds between threshold sweeps
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 60)]
    sweep_interval: u64,

    /// Seconds between summary window checks, under an hour so the weekly
    /// window is never skipped
    #[arg(
        long,
        env = "SUMMARY_CHECK_INTERVAL_SECS",
        default_value_t = 300,
        value_parser = clap::value_parser!(u64).range(1..3600)
    )]
    summary_check_interval: u64,
}

fn init_logging(level: &str) {
    let level = match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

fn build_source(
    kind: SourceKind,
    config: &AppConfig,
    dexscreener: Arc<DexscreenerClient>,
) -> Result<Arc<dyn TokenSource>, FeedError> {
    match kind {
        SourceKind::Dexscreener => Ok(dexscreener as Arc<dyn TokenSource>),
        SourceKind::Helius => {
            let api_key = config.helius_api_key.clone().unwrap_or_default();
            let helius = HeliusSource::new(HeliusConfig::new(api_key), dexscreener)?;
            Ok(Arc::new(helius))
        }
    }
}

/// Seconds to duration, never zero.
fn interval(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("💎 Gemwatch starting");

    let config = match AppConfig::from_env(args.source) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    info!("  Source: {:?}", args.source);
    info!("  Channel: {}", config.channel_id);
    info!("  Ladder: {:?}", config.ladder);
    info!("  Value metric: {:?}", config.metric);
    info!(
        "  Intervals: discovery {}s, sweep {}s, summary check {}s",
        args.discovery_interval, args.sweep_interval, args.summary_check_interval
    );
    info!(
        "  Summary window: {:?} {:02}:00 UTC",
        config.summary_window.weekday, config.summary_window.hour_utc
    );

    let dexscreener = match DexscreenerClient::new(DexscreenerConfig::default()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to create Dexscreener client: {}", e);
            std::process::exit(1);
        }
    };
    let source = match build_source(args.source, &config, dexscreener.clone()) {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to create token source: {}", e);
            std::process::exit(1);
        }
    };

    let tracker = Arc::new(Tracker::new(
        TrackerStore::new(config.eviction),
        source,
        dexscreener,
        Arc::new(TelegramNotifier::new(&config.telegram_token)),
        config.tracker_config(),
    ));
    let gate = Arc::new(WeeklyGate::new(config.summary_window));
    info!("  Eviction: {:?}", tracker.store().policy());

    let mut scheduler = Scheduler::new();

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let bot_name = &config.template.bot_name;
    let liveness_handle =
        match liveness::start_liveness_server(addr, bot_name, scheduler.shutdown_signal()).await {
            Ok((_, handle)) => handle,
            Err(e) => {
                error!("Failed to start liveness endpoint: {}", e);
                std::process::exit(1);
            }
        };

    let discovery = tracker.clone();
    scheduler.every("discovery", interval(args.discovery_interval), move || {
        let tracker = discovery.clone();
        async move {
            tracker.discovery_sweep().await;
        }
    });

    let sweep = tracker.clone();
    scheduler.every("threshold-sweep", interval(args.sweep_interval), move || {
        let tracker = sweep.clone();
        async move {
            tracker.threshold_sweep().await;
        }
    });

    let summary = tracker.clone();
    scheduler.every("summary", interval(args.summary_check_interval), move || {
        let tracker = summary.clone();
        let gate = gate.clone();
        async move {
            tracker.summary_tick(&gate, Utc::now()).await;
        }
    });

    // Handle shutdown
    info!("Press Ctrl+C to stop...");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }

    warn!("Shutdown signal received");
    scheduler.shutdown(Duration::from_secs(5)).await;
    let _ = tokio::time::timeout(Duration::from_secs(2), liveness_handle).await;

    info!("📈 Tracked tokens at shutdown: {}", tracker.store().len());
    info!("👋 Gemwatch stopped");
}
