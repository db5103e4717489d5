pub mod binance;
pub mod paper;
