use std::env;
use std::str::FromStr;

/// Loop cadences and concurrency bounds, in seconds unless noted.
#[derive(Debug, Clone)]
pub struct ScheduleEnvConfig {
    pub strategist_interval_secs: u64,
    pub trader_interval_secs: u64,
    pub perception_interval_secs: u64,
    pub environment_interval_secs: u64,
    pub sync_interval_secs: u64,
    pub max_concurrent_fetches: usize,
    pub max_concurrent_orders: usize,
    pub shutdown_grace_secs: u64,
    pub snapshot_ttl_secs: u64,
    pub max_snapshot_age_secs: i64,
    pub environment_ttl_secs: u64,
    pub per_source_timeout_secs: u64,
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ScheduleEnvConfig {
    pub fn from_env() -> Self {
        Self {
            strategist_interval_secs: env_parse("STRATEGIST_INTERVAL", 3600),
            trader_interval_secs: env_parse("TRADER_INTERVAL", 180),
            perception_interval_secs: env_parse("PERCEPTION_INTERVAL", 5),
            environment_interval_secs: env_parse("ENVIRONMENT_INTERVAL", 1800),
            sync_interval_secs: env_parse("SYNC_INTERVAL", 10),
            max_concurrent_fetches: env_parse("MAX_CONCURRENT_FETCHES", 5),
            max_concurrent_orders: env_parse("MAX_CONCURRENT_ORDERS", 5),
            shutdown_grace_secs: env_parse("SHUTDOWN_GRACE", 30),
            snapshot_ttl_secs: env_parse("SNAPSHOT_TTL", 30),
            max_snapshot_age_secs: env_parse("MAX_SNAPSHOT_AGE", 30),
            environment_ttl_secs: env_parse("ENVIRONMENT_TTL", 1800),
            per_source_timeout_secs: env_parse("ENVIRONMENT_SOURCE_TIMEOUT", 10),
        }
    }
}
