use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

/// Venue connectivity and trading-mode settings.
#[derive(Debug, Clone)]
pub struct ExchangeEnvConfig {
    pub trading_exchange: String,
    pub data_source_exchange: String,
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
    /// When false the executor trades against the paper gateway only.
    pub enable_trading: bool,
    /// Perpetual futures vs spot. The core trades perpetuals.
    pub futures: bool,
    pub rate_limit_per_sec: f64,
    pub call_timeout_secs: u64,
    pub paper_starting_balance: Decimal,
    pub initial_capital: Decimal,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ExchangeEnvConfig {
    pub fn from_env() -> Self {
        Self {
            trading_exchange: env_or("TRADING_EXCHANGE", "binance"),
            data_source_exchange: env_or("DATA_SOURCE_EXCHANGE", "binance"),
            api_key: env_or("EXCHANGE_API_KEY", ""),
            api_secret: env_or("EXCHANGE_API_SECRET", ""),
            base_url: env_or("EXCHANGE_BASE_URL", "https://fapi.binance.com"),
            enable_trading: env_parse("ENABLE_TRADING", false),
            futures: env_parse("FUTURES", true),
            rate_limit_per_sec: env_parse("EXCHANGE_RATE_LIMIT_PER_SEC", 20.0),
            call_timeout_secs: env_parse("EXCHANGE_CALL_TIMEOUT_SECS", 10),
            paper_starting_balance: env_parse(
                "PAPER_STARTING_BALANCE",
                Decimal::from(10_000),
            ),
            initial_capital: env_parse("INITIAL_CAPITAL", Decimal::from(10_000)),
        }
    }
}
