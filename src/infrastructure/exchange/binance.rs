//! Binance USDⓈ-M futures gateway.
//!
//! Every call acquires rate-limit tokens first, then goes through the
//! retrying HTTP client. Venue errors are wrapped into `GatewayError`;
//! callers never see a raw reqwest or Binance error. Signed endpoints
//! use HMAC-SHA256 over the query string.

use crate::domain::errors::GatewayError;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::market::types::{Candle, Ticker};
use crate::domain::ports::{ExchangeGateway, GatewayHealth};
use crate::domain::trading::portfolio::AccountBalance;
use crate::domain::trading::position::ExchangePosition;
use crate::domain::trading::symbol::SymbolMapper;
use crate::domain::trading::types::{
    Order, OrderRequest, OrderSide, OrderStatus, OrderType, TradeFill,
};
use crate::infrastructure::cache::TtlCache;
use crate::infrastructure::core::http_client_factory::{HttpClientFactory, build_url_with_query};
use crate::infrastructure::core::rate_limiter::TokenBucket;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest_middleware::ClientWithMiddleware;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const TICKER_CACHE_TTL: Duration = Duration::from_secs(60);

pub struct BinanceFuturesGateway {
    client: ClientWithMiddleware,
    api_key: String,
    api_secret: String,
    base_url: String,
    mapper: SymbolMapper,
    limiter: Arc<TokenBucket>,
    ticker_cache: TtlCache<String, Ticker>,
}

impl BinanceFuturesGateway {
    pub fn new(
        api_key: String,
        api_secret: String,
        base_url: String,
        mapper: SymbolMapper,
        rate_limit_per_sec: f64,
        call_timeout: Duration,
    ) -> Self {
        Self {
            client: HttpClientFactory::create_client(call_timeout),
            api_key,
            api_secret,
            base_url,
            mapper,
            limiter: Arc::new(TokenBucket::new("binance-futures", rate_limit_per_sec)),
            ticker_cache: TtlCache::new(TICKER_CACHE_TTL),
        }
    }

    fn sign_request(&self, query_string: &str) -> String {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts keys of any size");
        mac.update(query_string.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn signed_url(&self, path: &str, params: &[(&str, String)]) -> String {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let mut all: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        all.push(("timestamp".to_string(), timestamp.to_string()));

        let query_string: String = all
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let signature = self.sign_request(&query_string);
        format!(
            "{}{}?{}&signature={}",
            self.base_url, path, query_string, signature
        )
    }

    async fn send_public(
        &self,
        weight: u32,
        url: String,
    ) -> Result<serde_json::Value, GatewayError> {
        self.limiter.acquire(weight).await;
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::Network {
                venue: "binance".to_string(),
                reason: e.to_string(),
            })?;
        Self::decode_response(response).await
    }

    async fn send_signed(
        &self,
        weight: u32,
        method: reqwest::Method,
        url: String,
    ) -> Result<serde_json::Value, GatewayError> {
        self.limiter.acquire(weight).await;
        let response = self
            .client
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| GatewayError::Network {
                venue: "binance".to_string(),
                reason: e.to_string(),
            })?;
        Self::decode_response(response).await
    }

    async fn decode_response(
        response: reqwest::Response,
    ) -> Result<serde_json::Value, GatewayError> {
        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response.text().await.map_err(|e| GatewayError::Network {
            venue: "binance".to_string(),
            reason: e.to_string(),
        })?;

        if status.as_u16() == 429 || status.as_u16() == 418 {
            return Err(GatewayError::RateLimited {
                venue: "binance".to_string(),
                retry_after_secs: retry_after.unwrap_or(5),
            });
        }
        if status.is_server_error() {
            return Err(GatewayError::Network {
                venue: "binance".to_string(),
                reason: format!("{status}: {body}"),
            });
        }
        if !status.is_success() {
            return Err(classify_venue_error(&body));
        }

        serde_json::from_str(&body).map_err(|e| GatewayError::Network {
            venue: "binance".to_string(),
            reason: format!("undecodable response: {e}"),
        })
    }
}

/// Binance error bodies carry `{"code": -nnnn, "msg": "..."}`.
fn classify_venue_error(body: &str) -> GatewayError {
    #[derive(Deserialize)]
    struct VenueError {
        code: i64,
        msg: String,
    }

    match serde_json::from_str::<VenueError>(body) {
        Ok(err) if err.code == -2013 => GatewayError::OrderNotFound {
            order_id: String::new(),
            symbol: String::new(),
        },
        Ok(err) => GatewayError::Exchange {
            code: err.code,
            message: err.msg,
        },
        Err(_) => GatewayError::Exchange {
            code: 0,
            message: body.to_string(),
        },
    }
}

fn parse_decimal(value: &serde_json::Value) -> Decimal {
    match value {
        serde_json::Value::String(s) => s.parse().unwrap_or(Decimal::ZERO),
        serde_json::Value::Number(n) => n
            .as_f64()
            .and_then(Decimal::from_f64_retain)
            .unwrap_or(Decimal::ZERO),
        _ => Decimal::ZERO,
    }
}

fn map_order_status(status: &str) -> OrderStatus {
    match status {
        "NEW" => OrderStatus::Open,
        "PARTIALLY_FILLED" => OrderStatus::Partial,
        "FILLED" => OrderStatus::Filled,
        "CANCELED" => OrderStatus::Cancelled,
        "REJECTED" => OrderStatus::Rejected,
        "EXPIRED" | "EXPIRED_IN_MATCH" => OrderStatus::Expired,
        _ => OrderStatus::Pending,
    }
}

fn map_order_type(order_type: &str) -> OrderType {
    match order_type {
        "LIMIT" => OrderType::Limit,
        "STOP_MARKET" => OrderType::StopMarket,
        "TAKE_PROFIT_MARKET" => OrderType::TakeProfitMarket,
        _ => OrderType::Market,
    }
}

fn venue_order_type(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::Market => "MARKET",
        OrderType::Limit => "LIMIT",
        OrderType::StopMarket => "STOP_MARKET",
        OrderType::TakeProfitMarket => "TAKE_PROFIT_MARKET",
    }
}

impl BinanceFuturesGateway {
    fn order_from_value(&self, value: &serde_json::Value) -> Option<Order> {
        let venue_symbol = value.get("symbol")?.as_str()?;
        let symbol = self.mapper.from_venue(venue_symbol).ok()?;
        let side = match value.get("side")?.as_str()? {
            "BUY" => OrderSide::Buy,
            _ => OrderSide::Sell,
        };
        let order_type = map_order_type(value.get("type")?.as_str().unwrap_or("MARKET"));
        let status = map_order_status(value.get("status").and_then(|s| s.as_str()).unwrap_or(""));
        let created_at = value.get("time").and_then(|t| t.as_i64()).unwrap_or(0);
        let updated_at = value
            .get("updateTime")
            .and_then(|t| t.as_i64())
            .unwrap_or(created_at);
        let avg = parse_decimal(value.get("avgPrice").unwrap_or(&serde_json::Value::Null));

        Some(Order {
            id: value
                .get("orderId")
                .map(|v| v.to_string().trim_matches('"').to_string()),
            client_order_id: value
                .get("clientOrderId")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            symbol,
            side,
            order_type,
            status,
            price: Some(parse_decimal(
                value.get("price").unwrap_or(&serde_json::Value::Null),
            ))
            .filter(|p| !p.is_zero()),
            amount: parse_decimal(value.get("origQty").unwrap_or(&serde_json::Value::Null)),
            filled: parse_decimal(value.get("executedQty").unwrap_or(&serde_json::Value::Null)),
            average: (!avg.is_zero()).then_some(avg),
            fee: None,
            fee_currency: None,
            stop_price: Some(parse_decimal(
                value.get("stopPrice").unwrap_or(&serde_json::Value::Null),
            ))
            .filter(|p| !p.is_zero()),
            reduce_only: value
                .get("reduceOnly")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            created_at,
            updated_at,
            linked_decision_id: None,
            raw_payload: Some(value.clone()),
        })
    }
}

#[async_trait]
impl ExchangeGateway for BinanceFuturesGateway {
    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, GatewayError> {
        let venue_symbol = self.mapper.to_venue(symbol);
        let url = build_url_with_query(
            &format!("{}/fapi/v1/ticker/24hr", self.base_url),
            &[("symbol", venue_symbol.as_str())],
        );
        let value = self.send_public(1, url).await?;

        let ticker = Ticker {
            symbol: symbol.to_string(),
            timestamp: value
                .get("closeTime")
                .and_then(|v| v.as_i64())
                .unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
            last: parse_decimal(value.get("lastPrice").unwrap_or(&serde_json::Value::Null)),
            bid: None,
            ask: None,
            high_24h: Some(parse_decimal(
                value.get("highPrice").unwrap_or(&serde_json::Value::Null),
            )),
            low_24h: Some(parse_decimal(
                value.get("lowPrice").unwrap_or(&serde_json::Value::Null),
            )),
            base_volume: parse_decimal(value.get("volume").unwrap_or(&serde_json::Value::Null)),
            quote_volume: parse_decimal(
                value.get("quoteVolume").unwrap_or(&serde_json::Value::Null),
            ),
            percent_change_24h: parse_decimal(
                value
                    .get("priceChangePercent")
                    .unwrap_or(&serde_json::Value::Null),
            ),
        };
        self.ticker_cache
            .put(symbol.to_string(), ticker.clone())
            .await;
        Ok(ticker)
    }

    async fn fetch_ticker_cached(&self, symbol: &str) -> Result<Ticker, GatewayError> {
        if let Some(cached) = self.ticker_cache.get(&symbol.to_string()).await {
            return Ok(cached);
        }
        self.fetch_ticker(symbol).await
    }

    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, GatewayError> {
        let venue_symbol = self.mapper.to_venue(symbol);
        let limit_string = limit.to_string();
        let url = build_url_with_query(
            &format!("{}/fapi/v1/klines", self.base_url),
            &[
                ("symbol", venue_symbol.as_str()),
                ("interval", timeframe.to_venue_string()),
                ("limit", limit_string.as_str()),
            ],
        );
        let value = self.send_public(5, url).await?;

        let rows = value.as_array().ok_or_else(|| GatewayError::Network {
            venue: "binance".to_string(),
            reason: "klines response is not an array".to_string(),
        })?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in rows {
            let fields = match row.as_array() {
                Some(f) if f.len() >= 6 => f,
                _ => continue,
            };
            candles.push(Candle {
                symbol: symbol.to_string(),
                timeframe,
                open_time: fields[0].as_i64().unwrap_or(0),
                open: parse_decimal(&fields[1]),
                high: parse_decimal(&fields[2]),
                low: parse_decimal(&fields[3]),
                close: parse_decimal(&fields[4]),
                volume: parse_decimal(&fields[5]),
            });
        }
        Ok(candles)
    }

    async fn fetch_balance(&self) -> Result<AccountBalance, GatewayError> {
        let url = self.signed_url("/fapi/v2/account", &[]);
        let value = self.send_signed(5, reqwest::Method::GET, url).await?;

        Ok(AccountBalance {
            wallet_balance: parse_decimal(
                value
                    .get("totalWalletBalance")
                    .unwrap_or(&serde_json::Value::Null),
            ),
            available_balance: parse_decimal(
                value
                    .get("availableBalance")
                    .unwrap_or(&serde_json::Value::Null),
            ),
            margin_balance: parse_decimal(
                value
                    .get("totalMarginBalance")
                    .unwrap_or(&serde_json::Value::Null),
            ),
            unrealized_pnl: parse_decimal(
                value
                    .get("totalUnrealizedProfit")
                    .unwrap_or(&serde_json::Value::Null),
            ),
        })
    }

    async fn fetch_positions(&self) -> Result<Vec<ExchangePosition>, GatewayError> {
        let url = self.signed_url("/fapi/v2/positionRisk", &[]);
        let value = self.send_signed(5, reqwest::Method::GET, url).await?;

        let rows = value.as_array().ok_or_else(|| GatewayError::Network {
            venue: "binance".to_string(),
            reason: "positionRisk response is not an array".to_string(),
        })?;

        let mut positions = Vec::new();
        for row in rows {
            let amount = parse_decimal(row.get("positionAmt").unwrap_or(&serde_json::Value::Null));
            if amount.is_zero() {
                continue;
            }
            let venue_symbol = row.get("symbol").and_then(|v| v.as_str()).unwrap_or("");
            let symbol = match self.mapper.from_venue(venue_symbol) {
                Ok(s) => s,
                Err(reason) => {
                    warn!("Skipping unmappable position symbol: {}", reason);
                    continue;
                }
            };
            // In hedge mode positionSide carries the side; the sign of
            // positionAmt covers one-way mode.
            let side = match row.get("positionSide").and_then(|v| v.as_str()) {
                Some("LONG") => OrderSide::Buy,
                Some("SHORT") => OrderSide::Sell,
                _ if amount > Decimal::ZERO => OrderSide::Buy,
                _ => OrderSide::Sell,
            };
            let liquidation =
                parse_decimal(row.get("liquidationPrice").unwrap_or(&serde_json::Value::Null));
            positions.push(ExchangePosition {
                symbol,
                side,
                amount: amount.abs(),
                entry_price: parse_decimal(
                    row.get("entryPrice").unwrap_or(&serde_json::Value::Null),
                ),
                mark_price: parse_decimal(
                    row.get("markPrice").unwrap_or(&serde_json::Value::Null),
                ),
                unrealized_pnl: parse_decimal(
                    row.get("unRealizedProfit")
                        .unwrap_or(&serde_json::Value::Null),
                ),
                leverage: row
                    .get("leverage")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1),
                liquidation_price: (!liquidation.is_zero()).then_some(liquidation),
            });
        }
        Ok(positions)
    }

    async fn fetch_open_orders(
        &self,
        symbol: Option<&str>,
    ) -> Result<Vec<Order>, GatewayError> {
        let params: Vec<(&str, String)> = match symbol {
            Some(s) => vec![("symbol", self.mapper.to_venue(s))],
            None => vec![],
        };
        let weight = if symbol.is_some() { 1 } else { 40 };
        let url = self.signed_url("/fapi/v1/openOrders", &params);
        let value = self.send_signed(weight, reqwest::Method::GET, url).await?;

        let rows = value.as_array().ok_or_else(|| GatewayError::Network {
            venue: "binance".to_string(),
            reason: "openOrders response is not an array".to_string(),
        })?;
        Ok(rows
            .iter()
            .filter_map(|row| self.order_from_value(row))
            .collect())
    }

    async fn fetch_my_trades(
        &self,
        symbol: &str,
        since_ms: i64,
    ) -> Result<Vec<TradeFill>, GatewayError> {
        let params = vec![
            ("symbol", self.mapper.to_venue(symbol)),
            ("startTime", since_ms.to_string()),
        ];
        let url = self.signed_url("/fapi/v1/userTrades", &params);
        let value = self.send_signed(5, reqwest::Method::GET, url).await?;

        let rows = value.as_array().ok_or_else(|| GatewayError::Network {
            venue: "binance".to_string(),
            reason: "userTrades response is not an array".to_string(),
        })?;

        let mut fills = Vec::with_capacity(rows.len());
        for row in rows {
            let side = match row.get("side").and_then(|v| v.as_str()) {
                Some("BUY") => OrderSide::Buy,
                _ => OrderSide::Sell,
            };
            let amount = parse_decimal(row.get("qty").unwrap_or(&serde_json::Value::Null));
            let price = parse_decimal(row.get("price").unwrap_or(&serde_json::Value::Null));
            fills.push(TradeFill {
                id: row
                    .get("id")
                    .map(|v| v.to_string().trim_matches('"').to_string())
                    .unwrap_or_default(),
                order_id: row
                    .get("orderId")
                    .map(|v| v.to_string().trim_matches('"').to_string())
                    .unwrap_or_default(),
                symbol: symbol.to_string(),
                side,
                price,
                amount,
                cost: parse_decimal(row.get("quoteQty").unwrap_or(&serde_json::Value::Null)),
                fee: parse_decimal(row.get("commission").unwrap_or(&serde_json::Value::Null)),
                fee_currency: row
                    .get("commissionAsset")
                    .and_then(|v| v.as_str())
                    .map(String::from),
                timestamp: row.get("time").and_then(|v| v.as_i64()).unwrap_or(0),
                is_liquidation: false,
                // positionSide+side determine whether the fill reduced;
                // the reconciler re-derives this from the diff anyway.
                reduce_only: false,
            });
        }
        Ok(fills)
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<Order, GatewayError> {
        let venue_symbol = self.mapper.to_venue(&request.symbol);
        // Hedge mode: the position side being affected. A reduce-only
        // order closes the opposite book side from its order side.
        let position_side = match (request.reduce_only, request.side) {
            (false, OrderSide::Buy) | (true, OrderSide::Sell) => "LONG",
            (false, OrderSide::Sell) | (true, OrderSide::Buy) => "SHORT",
        };

        let mut params: Vec<(&str, String)> = vec![
            ("symbol", venue_symbol),
            ("side", request.side.to_string()),
            ("positionSide", position_side.to_string()),
            ("type", venue_order_type(request.order_type).to_string()),
            ("quantity", request.amount.to_string()),
            ("newClientOrderId", request.client_order_id.clone()),
        ];
        if request.order_type == OrderType::Limit
            && let Some(price) = request.price
        {
            params.push(("price", price.to_string()));
            params.push(("timeInForce", "GTC".to_string()));
        }
        if let Some(stop_price) = request.stop_price {
            params.push(("stopPrice", stop_price.to_string()));
        }

        let url = self.signed_url("/fapi/v1/order", &params);
        let value = self.send_signed(1, reqwest::Method::POST, url).await?;

        info!(
            symbol = %request.symbol,
            client_order_id = %request.client_order_id,
            "Order accepted by venue"
        );

        self.order_from_value(&value)
            .ok_or_else(|| GatewayError::Network {
                venue: "binance".to_string(),
                reason: "order ack missing expected fields".to_string(),
            })
    }

    async fn cancel_order(&self, order_id: &str, symbol: &str) -> Result<(), GatewayError> {
        let params = vec![
            ("symbol", self.mapper.to_venue(symbol)),
            ("orderId", order_id.to_string()),
        ];
        let url = self.signed_url("/fapi/v1/order", &params);
        match self.send_signed(1, reqwest::Method::DELETE, url).await {
            Ok(_) => Ok(()),
            Err(GatewayError::OrderNotFound { .. }) => Err(GatewayError::OrderNotFound {
                order_id: order_id.to_string(),
                symbol: symbol.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), GatewayError> {
        let params = vec![
            ("symbol", self.mapper.to_venue(symbol)),
            ("leverage", leverage.to_string()),
        ];
        let url = self.signed_url("/fapi/v1/leverage", &params);
        self.send_signed(1, reqwest::Method::POST, url).await?;
        Ok(())
    }

    async fn fetch_funding_rate(&self, symbol: &str) -> Result<Option<Decimal>, GatewayError> {
        let venue_symbol = self.mapper.to_venue(symbol);
        let url = build_url_with_query(
            &format!("{}/fapi/v1/premiumIndex", self.base_url),
            &[("symbol", venue_symbol.as_str())],
        );
        let value = self.send_public(1, url).await?;
        let rate = parse_decimal(
            value
                .get("lastFundingRate")
                .unwrap_or(&serde_json::Value::Null),
        );
        Ok(Some(rate))
    }

    async fn fetch_long_short_ratio(
        &self,
        symbol: &str,
    ) -> Result<Option<Decimal>, GatewayError> {
        let venue_symbol = self.mapper.to_venue(symbol);
        let url = build_url_with_query(
            &format!("{}/futures/data/globalLongShortAccountRatio", self.base_url),
            &[
                ("symbol", venue_symbol.as_str()),
                ("period", "5m"),
                ("limit", "1"),
            ],
        );
        let value = self.send_public(1, url).await?;
        let ratio = value
            .as_array()
            .and_then(|rows| rows.first())
            .map(|row| parse_decimal(row.get("longShortRatio").unwrap_or(&serde_json::Value::Null)));
        Ok(ratio)
    }

    async fn health_check(&self) -> Result<GatewayHealth, GatewayError> {
        let started = Instant::now();
        let url = format!("{}/fapi/v1/ping", self.base_url);
        let reachable = self.send_public(1, url).await.is_ok();
        let stats = self.limiter.stats();
        Ok(GatewayHealth {
            reachable,
            latency_ms: started.elapsed().as_millis() as u64,
            total_requests: stats.total_requests,
            total_waits: stats.total_waits,
            average_wait_ms: stats.average_wait_ms(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::symbol::VenueSymbolRule;

    fn gateway() -> BinanceFuturesGateway {
        BinanceFuturesGateway::new(
            "key".to_string(),
            "secret".to_string(),
            "https://fapi.binance.com".to_string(),
            SymbolMapper::new(VenueSymbolRule::binance_futures()),
            20.0,
            Duration::from_secs(10),
        )
    }

    #[test]
    fn test_signature_is_deterministic_hex() {
        let g = gateway();
        let sig = g.sign_request("symbol=BTCUSDT&timestamp=1700000000000");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(sig, g.sign_request("symbol=BTCUSDT&timestamp=1700000000000"));
    }

    #[test]
    fn test_classify_venue_error() {
        let err = classify_venue_error(r#"{"code":-2019,"msg":"Margin is insufficient."}"#);
        assert!(matches!(err, GatewayError::Exchange { code: -2019, .. }));
        assert!(!err.is_retryable());

        let missing = classify_venue_error(r#"{"code":-2013,"msg":"Order does not exist."}"#);
        assert!(matches!(missing, GatewayError::OrderNotFound { .. }));

        let garbage = classify_venue_error("<html>bad gateway</html>");
        assert!(matches!(garbage, GatewayError::Exchange { code: 0, .. }));
    }

    #[test]
    fn test_order_status_mapping() {
        assert_eq!(map_order_status("NEW"), OrderStatus::Open);
        assert_eq!(map_order_status("PARTIALLY_FILLED"), OrderStatus::Partial);
        assert_eq!(map_order_status("FILLED"), OrderStatus::Filled);
        assert_eq!(map_order_status("CANCELED"), OrderStatus::Cancelled);
        assert_eq!(map_order_status("EXPIRED"), OrderStatus::Expired);
    }

    #[test]
    fn test_order_from_value() {
        let g = gateway();
        let value: serde_json::Value = serde_json::from_str(
            r#"{
                "orderId": 283194212,
                "clientOrderId": "a1b2c3",
                "symbol": "ETHUSDT",
                "side": "SELL",
                "type": "STOP_MARKET",
                "status": "NEW",
                "price": "0",
                "avgPrice": "0.00000",
                "origQty": "1.000",
                "executedQty": "0",
                "stopPrice": "2940.0",
                "reduceOnly": true,
                "time": 1700000000000,
                "updateTime": 1700000001000
            }"#,
        )
        .unwrap();
        let order = g.order_from_value(&value).unwrap();
        assert_eq!(order.symbol, "ETH/USDT");
        assert_eq!(order.order_type, OrderType::StopMarket);
        assert_eq!(order.status, OrderStatus::Open);
        assert!(order.reduce_only);
        assert!(order.price.is_none());
        assert_eq!(order.stop_price.unwrap().to_string(), "2940.0");
    }

    #[test]
    fn test_parse_decimal_variants() {
        assert_eq!(
            parse_decimal(&serde_json::json!("123.45")).to_string(),
            "123.45"
        );
        assert_eq!(parse_decimal(&serde_json::json!(2)).to_string(), "2");
        assert_eq!(parse_decimal(&serde_json::Value::Null), Decimal::ZERO);
    }
}
