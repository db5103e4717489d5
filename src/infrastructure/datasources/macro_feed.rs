//! Macro and equity-index collectors.
//!
//! These feeds are credentialed and deployment-specific, so the shipped
//! implementation reads operator-fed environment values. Deployments
//! with a live data vendor implement `MacroDataProvider` /
//! `EquityDataProvider` against it; a missing value leaves its slot
//! empty and never fails the environment tick.

use crate::domain::market::environment::{EquityIndices, MacroIndicators};
use crate::domain::ports::{EquityDataProvider, MacroDataProvider};
use anyhow::Result;
use async_trait::async_trait;
use std::env;

fn env_f64(key: &str) -> Option<f64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

pub struct EnvMacroProvider;

#[async_trait]
impl MacroDataProvider for EnvMacroProvider {
    async fn fetch_macro(&self) -> Result<MacroIndicators> {
        let indicators = MacroIndicators {
            fed_rate: env_f64("MACRO_FED_RATE"),
            cpi: env_f64("MACRO_CPI"),
            dxy: env_f64("MACRO_DXY"),
            dxy_change_24h: env_f64("MACRO_DXY_CHANGE_24H"),
        };
        if indicators.fed_rate.is_none()
            && indicators.cpi.is_none()
            && indicators.dxy.is_none()
        {
            anyhow::bail!("no macro values configured");
        }
        Ok(indicators)
    }
}

pub struct EnvEquityProvider;

#[async_trait]
impl EquityDataProvider for EnvEquityProvider {
    async fn fetch_indices(&self) -> Result<EquityIndices> {
        let indices = EquityIndices {
            sp500: env_f64("STOCKS_SP500"),
            sp500_change_24h: env_f64("STOCKS_SP500_CHANGE_24H"),
            nasdaq: env_f64("STOCKS_NASDAQ"),
        };
        if indices.sp500.is_none() && indices.nasdaq.is_none() {
            anyhow::bail!("no equity index values configured");
        }
        Ok(indices)
    }
}
