use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::api::binance::{BINANCE_REST_BASE, BINANCE_WS_BASE};
use crate::strategy::{Preset, SignalConfig};

const DEFAULT_CONFIG_FILE: &str = "signalbot";
const ENV_PREFIX: &str = "SIGNALBOT";

/// Fatal configuration problems, reported at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("{0} must be greater than zero")]
    NonPositivePeriod(&'static str),

    #[error("invalid {name} band [{lower}, {upper}]: bounds must be ordered and within [0, 100]")]
    InvalidBand {
        name: &'static str,
        lower: f64,
        upper: f64,
    },

    #[error("{name} must be a finite non-negative number, got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("history capacity {capacity} is below the warm-up length {warmup}")]
    UnreachableWarmup { capacity: usize, warmup: usize },

    #[error("{0}")]
    Invalid(String),
}

/// Individual threshold overrides applied on top of the selected preset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyOverrides {
    pub ema_short_period: Option<usize>,
    pub ema_long_period: Option<usize>,
    pub rsi_period: Option<usize>,
    pub atr_period: Option<usize>,
    pub cooldown_ms: Option<u64>,
    pub rsi_entry_lower: Option<f64>,
    pub rsi_entry_upper: Option<f64>,
    pub rsi_exit_lower: Option<f64>,
    pub rsi_exit_upper: Option<f64>,
    pub entry_price_multiplier: Option<f64>,
    pub exit_price_multiplier: Option<f64>,
    pub ema_separation_multiplier: Option<f64>,
    pub stop_loss_pct: Option<f64>,
    pub min_profit_target_pct: Option<f64>,
}

impl StrategyOverrides {
    pub fn apply(&self, mut config: SignalConfig) -> SignalConfig {
        if let Some(value) = self.ema_short_period {
            config.ema_short_period = value;
        }
        if let Some(value) = self.ema_long_period {
            config.ema_long_period = value;
        }
        if let Some(value) = self.rsi_period {
            config.rsi_period = value;
        }
        if let Some(value) = self.atr_period {
            config.atr_period = value;
        }
        if let Some(value) = self.cooldown_ms {
            config.cooldown_ms = value;
        }
        if let Some(value) = self.rsi_entry_lower {
            config.rsi_entry_lower = value;
        }
        if let Some(value) = self.rsi_entry_upper {
            config.rsi_entry_upper = value;
        }
        if let Some(value) = self.rsi_exit_lower {
            config.rsi_exit_lower = value;
        }
        if let Some(value) = self.rsi_exit_upper {
            config.rsi_exit_upper = value;
        }
        if let Some(value) = self.entry_price_multiplier {
            config.entry_price_multiplier = value;
        }
        if let Some(value) = self.exit_price_multiplier {
            config.exit_price_multiplier = value;
        }
        if let Some(value) = self.ema_separation_multiplier {
            config.ema_separation_multiplier = value;
        }
        if let Some(value) = self.stop_loss_pct {
            config.stop_loss_pct = value;
        }
        if self.min_profit_target_pct.is_some() {
            config.min_profit_target_pct = self.min_profit_target_pct;
        }

        config
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    pub initial_capital: f64,
    pub commission_rate: f64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            initial_capital: 1000.0,
            commission_rate: 0.001,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatSettings {
    pub status_interval_secs: u64,
    pub hold_interval_secs: u64,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            status_interval_secs: 30,
            hold_interval_secs: 60,
        }
    }
}

impl HeartbeatSettings {
    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    pub fn hold_interval(&self) -> Duration {
        Duration::from_secs(self.hold_interval_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    pub bot_token: Option<String>,
    pub chat_ids: Vec<String>,
}

impl TelegramSettings {
    pub fn is_configured(&self) -> bool {
        self.bot_token.as_deref().is_some_and(|t| !t.is_empty()) && !self.chat_ids.is_empty()
    }
}

/// Startup configuration, immutable once loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub symbol: String,
    pub interval: String,
    pub rest_base_url: String,
    pub ws_base_url: String,
    pub preset: Preset,
    pub strategy: StrategyOverrides,
    pub ledger: LedgerSettings,
    pub heartbeat: HeartbeatSettings,
    pub telegram: TelegramSettings,
    pub history_margin: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            interval: "1m".to_string(),
            rest_base_url: BINANCE_REST_BASE.to_string(),
            ws_base_url: BINANCE_WS_BASE.to_string(),
            preset: Preset::default(),
            strategy: StrategyOverrides::default(),
            ledger: LedgerSettings::default(),
            heartbeat: HeartbeatSettings::default(),
            telegram: TelegramSettings::default(),
            history_margin: 2,
        }
    }
}

impl Settings {
    /// Load from the optional config file, then `SIGNALBOT__*` variables
    ///
    /// Without an explicit path, `signalbot.toml` in the working directory is
    /// used if present. `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_IDS` fill in the
    /// Telegram section when it is left empty.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let mut settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.apply_telegram_env(
            std::env::var("TELEGRAM_BOT_TOKEN").ok(),
            std::env::var("TELEGRAM_CHAT_IDS").ok(),
        );
        settings.validate()?;

        tracing::info!(
            symbol = %settings.symbol,
            interval = %settings.interval,
            preset = ?settings.preset,
            "Configuration loaded"
        );

        Ok(settings)
    }

    /// Parse a TOML document on top of the defaults, without environment input
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Fill empty Telegram settings from the legacy variables
    ///
    /// Chat ids are comma-separated; blanks are ignored.
    pub fn apply_telegram_env(&mut self, bot_token: Option<String>, chat_ids: Option<String>) {
        if self.telegram.bot_token.is_none() {
            self.telegram.bot_token = bot_token.filter(|t| !t.trim().is_empty());
        }

        if self.telegram.chat_ids.is_empty() {
            if let Some(ids) = chat_ids {
                self.telegram.chat_ids = ids
                    .split(',')
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .collect();
            }
        }
    }

    /// Preset thresholds with the individual overrides applied
    pub fn signal_config(&self) -> SignalConfig {
        self.strategy.apply(SignalConfig::preset(self.preset))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("symbol must not be empty".to_string()));
        }
        if self.interval.trim().is_empty() {
            return Err(ConfigError::Invalid("interval must not be empty".to_string()));
        }

        self.signal_config().validate(self.history_margin)?;

        let capital = self.ledger.initial_capital;
        if !(capital.is_finite() && capital > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "initial_capital must be positive, got {}",
                capital
            )));
        }

        let commission = self.ledger.commission_rate;
        if !(commission.is_finite() && (0.0..1.0).contains(&commission)) {
            return Err(ConfigError::Invalid(format!(
                "commission_rate must be in [0, 1), got {}",
                commission
            )));
        }

        if self.heartbeat.status_interval_secs == 0 {
            return Err(ConfigError::NonPositivePeriod("status_interval_secs"));
        }
        if self.heartbeat.hold_interval_secs == 0 {
            return Err(ConfigError::NonPositivePeriod("hold_interval_secs"));
        }

        Ok(())
    }

    /// Buffer capacity derived from the strategy periods
    pub fn history_capacity(&self) -> usize {
        self.signal_config().history_capacity(self.history_margin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.symbol, "BTCUSDT");
        assert_eq!(settings.interval, "1m");
        assert_eq!(settings.ledger.initial_capital, 1000.0);
        assert_eq!(settings.heartbeat.status_interval(), Duration::from_secs(30));
        assert_eq!(settings.history_capacity(), 23);
        assert_eq!(settings.signal_config(), SignalConfig::default());
    }

    #[test]
    fn test_toml_with_preset_and_overrides() {
        let settings = Settings::from_toml_str(
            r#"
            symbol = "ETHUSDT"
            preset = "classic"
            history_margin = 5

            [strategy]
            stop_loss_pct = 2.5
            cooldown_ms = 30000

            [ledger]
            initial_capital = 250.0
            "#,
        )
        .unwrap();

        assert_eq!(settings.symbol, "ETHUSDT");
        assert_eq!(settings.interval, "1m");
        assert_eq!(settings.preset, Preset::Classic);

        let config = settings.signal_config();
        assert_eq!(config.ema_short_period, 10);
        assert_eq!(config.stop_loss_pct, 2.5);
        assert_eq!(config.cooldown_ms, 30_000);
        assert_eq!(config.min_profit_target_pct, Some(1.0));
        assert_eq!(settings.ledger.initial_capital, 250.0);
        assert_eq!(settings.ledger.commission_rate, 0.001);
        assert_eq!(settings.history_capacity(), 26);
    }

    #[test]
    fn test_invalid_override_is_fatal() {
        let result = Settings::from_toml_str(
            r#"
            [strategy]
            ema_short_period = 0
            "#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::NonPositivePeriod("ema_short_period"))
        ));
    }

    #[test]
    fn test_bad_commission_rejected() {
        let mut settings = Settings::default();
        settings.ledger.commission_rate = 1.0;
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_heartbeat_rejected() {
        let mut settings = Settings::default();
        settings.heartbeat.hold_interval_secs = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::NonPositivePeriod("hold_interval_secs"))
        ));
    }

    #[test]
    fn test_malformed_toml_is_load_error() {
        let result = Settings::from_toml_str("symbol = [");
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_telegram_env_fallback() {
        let mut settings = Settings::default();
        assert!(!settings.telegram.is_configured());

        settings.apply_telegram_env(Some("123:abc".to_string()), Some(" 111, 222 ,,".to_string()));
        assert!(settings.telegram.is_configured());
        assert_eq!(settings.telegram.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(settings.telegram.chat_ids, vec!["111", "222"]);
    }

    #[test]
    fn test_telegram_file_values_win() {
        let mut settings = Settings::default();
        settings.telegram.bot_token = Some("file-token".to_string());
        settings.telegram.chat_ids = vec!["999".to_string()];

        settings.apply_telegram_env(Some("env-token".to_string()), Some("111".to_string()));
        assert_eq!(settings.telegram.bot_token.as_deref(), Some("file-token"));
        assert_eq!(settings.telegram.chat_ids, vec!["999"]);
    }
}
