use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

/// Risk limits, expressed as fractions unless noted.
#[derive(Debug, Clone)]
pub struct RiskEnvConfig {
    pub max_position_size: f64,
    pub max_single_trade: Decimal,
    pub max_daily_loss: f64,
    pub max_drawdown: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub max_leverage_major: u32,
    pub max_leverage_altcoin: u32,
    pub high_leverage_warning: u32,
    pub min_stop_distance_pct: f64,
    pub max_stop_distance_pct: f64,
    pub liquidation_safety_margin: f64,
    pub hedge_mode: bool,
    pub default_leverage: u32,
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl RiskEnvConfig {
    pub fn from_env() -> Self {
        Self {
            max_position_size: env_parse("MAX_POSITION_SIZE", 0.20),
            max_single_trade: env_parse("MAX_SINGLE_TRADE", Decimal::from(50_000)),
            max_daily_loss: env_parse("MAX_DAILY_LOSS", 0.05),
            max_drawdown: env_parse("MAX_DRAWDOWN", 0.15),
            stop_loss_pct: env_parse("STOP_LOSS_PCT", 0.02),
            take_profit_pct: env_parse("TAKE_PROFIT_PCT", 0.04),
            max_leverage_major: env_parse("MAX_LEVERAGE_MAJOR", 50),
            max_leverage_altcoin: env_parse("MAX_LEVERAGE_ALTCOIN", 20),
            high_leverage_warning: env_parse("HIGH_LEVERAGE_WARNING", 25),
            min_stop_distance_pct: env_parse("MIN_STOP_DISTANCE_PCT", 0.003),
            max_stop_distance_pct: env_parse("MAX_STOP_DISTANCE_PCT", 0.10),
            liquidation_safety_margin: env_parse("LIQUIDATION_SAFETY_MARGIN", 0.05),
            hedge_mode: env_parse("HEDGE_MODE", true),
            default_leverage: env_parse("DEFAULT_LEVERAGE", 5),
        }
    }
}
