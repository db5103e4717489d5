//! End-to-end decision flow over the paper venue: strategist publishes a
//! regime, the trader batch produces a signal, risk sizes and approves
//! it, the executor fills it with protective companions, and the
//! synchronizer reconciles the resulting position.

mod common;

use chrono::Utc;
use common::{ScriptedModel, snapshot_map, test_repos};
use perpilot::application::execution::{InstrumentLocks, OrderExecutor};
use perpilot::application::portfolio_manager::PortfolioManager;
use perpilot::application::regime_store::RegimeStore;
use perpilot::application::risk::{
    CircuitBreakerConfig, DailyCircuitBreaker, RiskConfig, RiskManager,
};
use perpilot::application::strategist::{Strategist, StrategistConfig};
use perpilot::application::sync::AccountSynchronizer;
use perpilot::application::trader::{Trader, TraderConfig};
use perpilot::domain::market::environment::{MarketEnvironment, SentimentGauge};
use perpilot::domain::trading::signal::SignalType;
use perpilot::domain::trading::types::OrderSide;
use perpilot::infrastructure::exchange::paper::PaperGateway;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

const STRATEGIST_RESPONSE: &str = r#"{
    "regime": "bull",
    "risk_level": "medium",
    "trading_mode": "normal",
    "recommended_symbols": ["ETH"],
    "blacklist": [],
    "cash_ratio_target": 0.2,
    "position_sizing_multiplier": 1.0,
    "suggested_allocation": {"ETH": 0.5},
    "narrative": "constructive structure",
    "key_drivers": ["funding reset"],
    "confidence": 0.8
}"#;

const TRADER_RESPONSE: &str = r#"[
    {"symbol": "ETH/USDT", "signal_type": "enter_long", "confidence": 0.85,
     "suggested_price": 3000, "suggested_amount": 0.5, "leverage": 10,
     "stop_loss": 2940, "take_profit": 3120,
     "reasoning": "momentum with funding tailwind",
     "supporting_factors": ["macd cross"], "risk_factors": ["funding flip"]}
]"#;

#[tokio::test]
async fn test_full_cycle_from_environment_to_position() {
    let repos = test_repos().await;
    let gateway = Arc::new(PaperGateway::new(None, dec!(10000)));
    gateway.set_mark_price("ETH/USDT", dec!(3000)).await;

    let locks = Arc::new(InstrumentLocks::new());
    let store = Arc::new(RegimeStore::new());
    let portfolio_manager = Arc::new(PortfolioManager::new(
        repos.positions.clone(),
        "binance".to_string(),
    ));
    let synchronizer = AccountSynchronizer::new(
        gateway.clone(),
        repos.positions.clone(),
        repos.trades.clone(),
        repos.orders.clone(),
        repos.snapshots.clone(),
        portfolio_manager.clone(),
        locks.clone(),
        "binance".to_string(),
    );
    let executor = OrderExecutor::new(
        gateway.clone(),
        repos.orders.clone(),
        repos.decisions.clone(),
        locks,
    );
    let breaker = Arc::new(DailyCircuitBreaker::new(
        CircuitBreakerConfig::default(),
        dec!(10000),
    ));
    let risk_manager = RiskManager::new(RiskConfig::default(), breaker).unwrap();

    // 1. Strategist publishes a regime from the environment
    let strategist = Strategist::new(
        ScriptedModel::new(vec![STRATEGIST_RESPONSE]),
        store.clone(),
        repos.decisions.clone(),
        StrategistConfig::default(),
    );
    let environment = MarketEnvironment {
        ts: Utc::now(),
        macro_indicators: None,
        stocks: None,
        sentiment: Some(SentimentGauge {
            fear_greed: Some(60),
            ..Default::default()
        }),
        crypto_overview: None,
        news_events: vec![],
        completeness_score: 0.4,
    };
    let symbols = vec!["ETH/USDT".to_string()];
    synchronizer.sync_tick(&symbols).await.unwrap();
    let portfolio = portfolio_manager.portfolio().await;
    strategist
        .run_tick(&environment, &portfolio, &[])
        .await
        .unwrap();
    let regime = store.current_valid().await.expect("regime published");

    // 2. Trader batch produces an entry signal
    let trader = Trader::new(
        ScriptedModel::new(vec![TRADER_RESPONSE]),
        repos.decisions.clone(),
        TraderConfig::default(),
    );
    let snapshots = snapshot_map(&[("ETH/USDT", dec!(3000))]);
    let result = trader.run_tick(&regime, &snapshots, &portfolio).await;
    assert_eq!(result.signals.len(), 1);
    let signal = &result.signals[0];
    assert_eq!(signal.signal_type, SignalType::EnterLong);

    // 3. Risk approves and sizes
    let verdict = risk_manager
        .evaluate(signal, &regime, &portfolio, Decimal::ZERO)
        .await;
    assert!(verdict.passed, "risk rejected: {:?}", verdict.reason);
    let approved = verdict.order.unwrap();
    assert_eq!(approved.amount, dec!(0.5));
    assert_eq!(approved.stop_loss, Some(dec!(2940)));

    // 4. Executor fills on the paper venue with companions
    let report = executor
        .execute(&approved, result.decision_id)
        .await
        .unwrap();
    assert!(report.success);
    assert_eq!(report.companions.len(), 2);

    // 5. Sync adopts the position and rebuilds the portfolio
    synchronizer.sync_tick(&symbols).await.unwrap();
    let refreshed = portfolio_manager.portfolio().await;
    let position = refreshed
        .position("ETH/USDT", OrderSide::Buy)
        .expect("position adopted");
    assert_eq!(position.amount, dec!(0.5));
    assert_eq!(position.entry_price, dec!(3000));
    assert_eq!(position.stop_loss, Some(dec!(2940)));

    // Both decision layers are on record, and the order carries the
    // tactical decision id
    let decisions: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM decisions")
        .fetch_one(&repos.database.pool)
        .await
        .unwrap();
    assert_eq!(decisions.0, 2);

    let linked: (Option<i64>,) = sqlx::query_as(
        "SELECT linked_decision_id FROM orders WHERE order_type = 'market' LIMIT 1",
    )
    .fetch_one(&repos.database.pool)
    .await
    .unwrap();
    assert_eq!(linked.0, result.decision_id);
}

#[tokio::test]
async fn test_cycle_degrades_gracefully_without_regime() {
    // Trader has no valid regime: the coordinator skips the tick; here we
    // assert the store side of that contract.
    let store = RegimeStore::new();
    assert!(store.current_valid().await.is_none());

    let mut expired = common::bull_regime(&["BTC"]);
    expired.created_at = Utc::now() - chrono::Duration::hours(3);
    expired.valid_until = Some(Utc::now() - chrono::Duration::hours(2));
    store.put(expired).await;
    assert!(store.current_valid().await.is_none());
}
