use clap::Parser;
use signalbot::notify::TelegramSink;
use signalbot::{Result, Settings};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "chat_ids")]
#[command(about = "List chat ids that have messaged the Telegram bot")]
struct Args {
    /// Configuration file (defaults to ./signalbot.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bot token; overrides the configured one
    #[arg(long)]
    token: Option<String>,
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
    let token = match args.token {
        Some(token) => token,
        None => Settings::load(args.config.as_deref())?
            .telegram
            .bot_token
            .ok_or("No bot token: pass --token or set TELEGRAM_BOT_TOKEN")?,
    };

    let chats = TelegramSink::new(token)?.recent_chats().await?;
    if chats.is_empty() {
        println!("No chats found. Send the bot a message, then run this again.");
        return Ok(());
    }

    for chat in &chats {
        println!("👤 {}", chat.display_name());
        println!("🆔 Chat ID: {}", chat.id);
        println!("---");
    }

    Ok(())
}
