//! Symbol notation handling.
//!
//! The application speaks `BASE/QUOTE[:SETTLEMENT]` (e.g. "BTC/USDT",
//! "BTC/USDC:USDC"); venues speak their own compact forms. Translation is
//! declarative per venue: separator, settlement-suffix support and the
//! recognized quote currencies.

use serde::{Deserialize, Serialize};

/// Recognized quote currencies, longest first so "BTCUSDT" resolves to
/// BTC/USDT rather than BTCU/SDT.
const QUOTE_CURRENCIES: &[&str] = &["USDT", "USDC", "BUSD", "TUSD", "USD", "EUR", "BTC", "ETH"];

/// Declarative translation rules for one venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueSymbolRule {
    pub venue: String,
    /// Separator the venue uses in its own notation, if any.
    pub separator: Option<char>,
    pub has_settlement_suffix: bool,
    /// Quote currency renames, application form -> venue form.
    pub quote_currency_map: Vec<(String, String)>,
    pub supports_perpetual: bool,
}

impl VenueSymbolRule {
    pub fn binance_futures() -> Self {
        Self {
            venue: "binance".to_string(),
            separator: None,
            has_settlement_suffix: false,
            quote_currency_map: vec![],
            supports_perpetual: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SymbolMapper {
    rule: VenueSymbolRule,
}

impl SymbolMapper {
    pub fn new(rule: VenueSymbolRule) -> Self {
        Self { rule }
    }

    pub fn rule(&self) -> &VenueSymbolRule {
        &self.rule
    }

    /// "BTC/USDT" or "BTC/USDC:USDC" -> venue form (e.g. "BTCUSDT").
    pub fn to_venue(&self, symbol: &str) -> String {
        let without_settlement = symbol.split(':').next().unwrap_or(symbol);
        let (base, quote) = match without_settlement.split_once('/') {
            Some((b, q)) => (b, q),
            None => return without_settlement.to_string(),
        };
        let quote = self
            .rule
            .quote_currency_map
            .iter()
            .find(|(app, _)| app == quote)
            .map(|(_, venue)| venue.as_str())
            .unwrap_or(quote);
        match self.rule.separator {
            Some(sep) => format!("{base}{sep}{quote}"),
            None => format!("{base}{quote}"),
        }
    }

    /// Venue form -> "BASE/QUOTE". Unknown quote currencies are an error.
    pub fn from_venue(&self, venue_symbol: &str) -> Result<String, String> {
        if let Some(sep) = self.rule.separator {
            let mut parts = venue_symbol.splitn(2, sep);
            if let (Some(base), Some(quote)) = (parts.next(), parts.next()) {
                return Ok(format!("{base}/{quote}"));
            }
        }
        if venue_symbol.contains('/') {
            return Ok(venue_symbol.to_string());
        }
        if venue_symbol.is_empty() {
            return Err("cannot map empty symbol".to_string());
        }

        for quote in QUOTE_CURRENCIES {
            let venue_quote = self
                .rule
                .quote_currency_map
                .iter()
                .find(|(app, _)| app == quote)
                .map(|(_, v)| v.as_str())
                .unwrap_or(quote);
            if venue_symbol.ends_with(venue_quote) && venue_symbol.len() > venue_quote.len() {
                let base = &venue_symbol[..venue_symbol.len() - venue_quote.len()];
                if !base.is_empty() && base.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Ok(format!("{base}/{quote}"));
                }
            }
        }

        Err(format!(
            "cannot map venue symbol '{venue_symbol}': no recognized quote currency"
        ))
    }
}

/// Base asset of a symbol in any supported notation:
/// "BTC" | "BTC/USDT" | "BTC/USDC:USDC" all yield "BTC".
pub fn base_symbol(symbol: &str) -> &str {
    let without_settlement = symbol.split(':').next().unwrap_or(symbol);
    without_settlement
        .split('/')
        .next()
        .unwrap_or(without_settlement)
}

/// Tolerant match between a symbol in any notation and a base asset, so
/// regime recommendations ("BTC") match snapshot keys ("BTC/USDT").
pub fn matches_base(symbol: &str, base: &str) -> bool {
    base_symbol(symbol) == base_symbol(base)
}
