use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candle intervals understood by the snapshot builder and the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    OneMin,
    FiveMin,
    FifteenMin,
    OneHour,
    FourHour,
    OneDay,
}

impl Timeframe {
    pub fn to_minutes(&self) -> usize {
        match self {
            Timeframe::OneMin => 1,
            Timeframe::FiveMin => 5,
            Timeframe::FifteenMin => 15,
            Timeframe::OneHour => 60,
            Timeframe::FourHour => 240,
            Timeframe::OneDay => 1440,
        }
    }

    pub fn to_seconds(&self) -> i64 {
        (self.to_minutes() * 60) as i64
    }

    pub fn to_millis(&self) -> i64 {
        self.to_seconds() * 1000
    }

    /// Interval string as the venue kline API expects it.
    pub fn to_venue_string(&self) -> &'static str {
        match self {
            Timeframe::OneMin => "1m",
            Timeframe::FiveMin => "5m",
            Timeframe::FifteenMin => "15m",
            Timeframe::OneHour => "1h",
            Timeframe::FourHour => "4h",
            Timeframe::OneDay => "1d",
        }
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Timeframe::OneMin),
            "5m" => Ok(Timeframe::FiveMin),
            "15m" => Ok(Timeframe::FifteenMin),
            "1h" => Ok(Timeframe::OneHour),
            "4h" => Ok(Timeframe::FourHour),
            "1d" => Ok(Timeframe::OneDay),
            _ => Err(anyhow!(
                "Invalid timeframe: {}. Must be one of 1m, 5m, 15m, 1h, 4h, 1d",
                s
            )),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_venue_string())
    }
}
