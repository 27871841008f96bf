use chrono::{Duration, Utc};
use clap::{Parser, ValueEnum};
use signalbot::api::BinanceClient;
use signalbot::execution::TradingEngine;
use signalbot::replay::{MarketScenario, ReplayRunner, SyntheticDataGenerator};
use signalbot::{Candle, Result, Settings};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scenario {
    Uptrend,
    Downtrend,
    Sideways,
    Volatile,
    Crash,
}

impl From<Scenario> for MarketScenario {
    fn from(scenario: Scenario) -> Self {
        match scenario {
            Scenario::Uptrend => MarketScenario::Uptrend,
            Scenario::Downtrend => MarketScenario::Downtrend,
            Scenario::Sideways => MarketScenario::Sideways,
            Scenario::Volatile => MarketScenario::Volatile,
            Scenario::Crash => MarketScenario::Crash,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "replay")]
#[command(about = "Replay a candle series through the signal engine")]
struct Args {
    /// Configuration file (defaults to ./signalbot.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replay recent Binance klines instead of synthetic data
    #[arg(long)]
    binance: bool,

    /// Synthetic market scenario
    #[arg(long, value_enum, default_value = "volatile")]
    scenario: Scenario,

    /// Number of candles
    #[arg(short = 'n', long, default_value = "500")]
    candles: usize,

    /// Seed for synthetic data
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Simulated seconds between candles
    #[arg(long, default_value = "60")]
    step_secs: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signalbot=warn".into()),
        )
        .init();

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;
    let step = Duration::seconds(args.step_secs);
    let start = Utc::now() - step * i32::try_from(args.candles)?;

    let candles: Vec<Candle> = if args.binance {
        println!("📥 Fetching {} {} klines from Binance...", args.candles, settings.symbol);
        let client = BinanceClient::with_base_url(&settings.rest_base_url)?;
        // Binance caps a single klines request at 1000 rows
        let limit = u32::try_from(args.candles.min(1000))?;
        client
            .fetch_klines(&settings.symbol, &settings.interval, limit)
            .await?
    } else {
        println!(
            "🎲 Generating {} {:?} candles (seed {})",
            args.candles, args.scenario, args.seed
        );
        SyntheticDataGenerator::new(args.seed).generate(args.scenario.into(), args.candles, start, step)
    };

    let engine = TradingEngine::new(
        settings.symbol.clone(),
        settings.signal_config(),
        settings.ledger.initial_capital,
        settings.ledger.commission_rate,
        settings.history_margin,
        start,
    );

    let mut runner = ReplayRunner::new(engine, start);
    let report = runner.run(&candles, step);
    report.print_report();

    Ok(())
}
