use clap::Parser;
use signalbot::api::BinanceClient;
use signalbot::clock::{Clock, SystemClock};
use signalbot::execution::{FeedEvent, HeartbeatScheduler, PriceFeed, SharedEngine, TradingEngine};
use signalbot::notify::messages::{signal_message, status_message};
use signalbot::notify::{LogSink, NotificationSink, Notifier, TelegramSink};
use signalbot::{Result, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

const FEED_CHANNEL_SIZE: usize = 256;

#[derive(Parser, Debug)]
#[command(name = "signalbot")]
#[command(about = "Streaming EMA/RSI/ATR signal bot with Telegram notifications")]
struct Args {
    /// Configuration file (defaults to ./signalbot.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;
    let signal_config = settings.signal_config();

    tracing::info!("🚀 Signal bot starting");
    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Symbol: {} ({})", settings.symbol, settings.interval);
    tracing::info!("  Preset: {:?}", settings.preset);
    tracing::info!(
        "  EMA {}/{} | RSI {} | ATR {} | Cooldown {}s",
        signal_config.ema_short_period,
        signal_config.ema_long_period,
        signal_config.rsi_period,
        signal_config.atr_period,
        signal_config.cooldown_ms / 1000
    );
    tracing::info!("  Stop-loss: {}%", signal_config.stop_loss_pct);
    tracing::info!(
        "  Capital: {:.2} | Commission: {}%",
        settings.ledger.initial_capital,
        settings.ledger.commission_rate * 100.0
    );

    let (notifier, notifier_task) = start_notifier(&settings)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let engine = build_engine(&settings, clock.now()).await?;

    tracing::info!("\n🔄 Spawning tasks...");

    let (feed_tx, feed_rx) = mpsc::channel(FEED_CHANNEL_SIZE);
    let feed = PriceFeed::binance(&settings.ws_base_url, &settings.symbol, &settings.interval);
    tracing::info!("  📡 Feed: {}", feed.url());
    let feed_task = tokio::spawn(feed.run(feed_tx));

    let candle_task = {
        let engine = engine.clone();
        let notifier = notifier.clone();
        let clock = clock.clone();
        tokio::spawn(async move {
            candle_loop(engine, feed_rx, notifier, clock).await;
        })
    };

    let heartbeat_task = tokio::spawn(
        HeartbeatScheduler::new(
            engine.clone(),
            notifier.clone(),
            clock.clone(),
            settings.heartbeat.status_interval(),
            settings.heartbeat.hold_interval(),
        )
        .run(),
    );

    tracing::info!("✅ All tasks spawned");
    tracing::info!("\nPress Ctrl+C to stop...\n");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("\n⚠️  Received Ctrl+C, shutting down...");
        }
        result = feed_task => {
            tracing::error!("Price feed exited: {:?}", result);
        }
        result = candle_task => {
            tracing::error!("Candle loop exited: {:?}", result);
        }
        result = heartbeat_task => {
            tracing::error!("Heartbeat exited: {:?}", result);
        }
        result = notifier_task => {
            tracing::error!("Notifier exited: {:?}", result);
        }
    }

    if let Ok(status) = engine.status() {
        tracing::info!(
            capital = status.ledger.current_capital,
            realized_pct = status.ledger.realized_pnl_pct(),
            trades = status.trades,
            "Final ledger"
        );
    }

    tracing::info!("👋 Signal bot stopped");
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signalbot=info".into()),
        )
        .init();
}

/// Telegram when fully configured, otherwise log-only delivery
fn start_notifier(settings: &Settings) -> Result<(Notifier, tokio::task::JoinHandle<()>)> {
    let sink: Arc<dyn NotificationSink> = match &settings.telegram.bot_token {
        Some(token) if settings.telegram.is_configured() => Arc::new(TelegramSink::new(token.clone())?),
        _ => {
            tracing::error!("❌ Telegram bot token or chat id(s) missing, messages will only be logged");
            Arc::new(LogSink)
        }
    };

    Ok(Notifier::spawn(sink, settings.telegram.chat_ids.clone()))
}

/// Create the engine and seed it from REST history; failure here is fatal
async fn build_engine(settings: &Settings, now: chrono::DateTime<chrono::Utc>) -> Result<SharedEngine> {
    let mut engine = TradingEngine::new(
        settings.symbol.clone(),
        settings.signal_config(),
        settings.ledger.initial_capital,
        settings.ledger.commission_rate,
        settings.history_margin,
        now,
    );

    let capacity = settings.history_capacity();
    let client = BinanceClient::with_base_url(&settings.rest_base_url)?;

    tracing::info!("📥 Fetching {} historical candles...", capacity);
    // One extra row: the newest kline is usually still open and gets skipped
    let candles = client
        .fetch_klines(&settings.symbol, &settings.interval, capacity as u32 + 1)
        .await?;

    let seeded = engine.seed(&candles);
    let warmup = settings.signal_config().warmup_len();
    if seeded < warmup {
        tracing::warn!(
            "Backfill returned {} usable candles, {} needed; collecting the rest live",
            seeded,
            warmup
        );
    }

    Ok(SharedEngine::new(engine))
}

/// Serialize feed events onto the engine and queue the resulting messages
async fn candle_loop(
    engine: SharedEngine,
    mut rx: mpsc::Receiver<FeedEvent>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
) {
    while let Some(event) = rx.recv().await {
        let now = clock.now();

        let message = match event {
            FeedEvent::Connected => engine
                .with(|e| {
                    e.mark_activity(now);
                    Some(status_message(&e.status()))
                }),
            FeedEvent::Candle(candle) => engine.with(|e| {
                let outcome = e.on_candle(&candle, now);
                outcome
                    .signal()
                    .map(|signal| signal_message(e.symbol(), e.config(), signal))
            }),
            FeedEvent::Disconnected => {
                tracing::warn!("Feed disconnected, engine state retained");
                Ok(None)
            }
        };

        match message {
            Ok(Some(text)) => notifier.notify(text),
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Candle loop stopped: {}", e);
                break;
            }
        }
    }
}
