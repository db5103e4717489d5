//! Reconciliation scenarios: stop-loss close classification with exact
//! VWAP and fees, hedge-mode coexistence, and protective self-healing.

mod common;

use chrono::{Duration, Utc};
use common::test_repos;
use perpilot::application::execution::{InstrumentLocks, OrderExecutor};
use perpilot::application::portfolio_manager::PortfolioManager;
use perpilot::application::risk::ApprovedOrder;
use perpilot::domain::ports::ExchangeGateway;
use perpilot::application::sync::AccountSynchronizer;
use perpilot::domain::repositories::PositionRepository;
use perpilot::domain::trading::position::CloseReason;
use perpilot::domain::trading::signal::{SignalType, TradingSignal};
use perpilot::domain::trading::types::{OrderSide, OrderType};
use perpilot::infrastructure::exchange::paper::PaperGateway;
use rust_decimal_macros::dec;
use std::sync::Arc;

struct Harness {
    repos: common::TestRepos,
    gateway: Arc<PaperGateway>,
    executor: OrderExecutor,
    synchronizer: AccountSynchronizer,
    portfolio_manager: Arc<PortfolioManager>,
}

async fn harness() -> Harness {
    let repos = test_repos().await;
    let gateway = Arc::new(PaperGateway::new(None, dec!(10000)));
    let locks = Arc::new(InstrumentLocks::new());
    let portfolio_manager = Arc::new(PortfolioManager::new(
        repos.positions.clone(),
        "binance".to_string(),
    ));
    let executor = OrderExecutor::new(
        gateway.clone(),
        repos.orders.clone(),
        repos.decisions.clone(),
        locks.clone(),
    );
    let synchronizer = AccountSynchronizer::new(
        gateway.clone(),
        repos.positions.clone(),
        repos.trades.clone(),
        repos.orders.clone(),
        repos.snapshots.clone(),
        portfolio_manager.clone(),
        locks,
        "binance".to_string(),
    );
    Harness {
        repos,
        gateway,
        executor,
        synchronizer,
        portfolio_manager,
    }
}

fn approved_long(symbol: &str, amount: rust_decimal::Decimal) -> ApprovedOrder {
    ApprovedOrder {
        signal: TradingSignal {
            symbol: symbol.to_string(),
            signal_type: SignalType::EnterLong,
            confidence: 0.8,
            suggested_price: Some(dec!(3000)),
            suggested_amount: Some(amount),
            leverage: Some(10),
            stop_loss: Some(dec!(2940)),
            take_profit: Some(dec!(3120)),
            reasoning: "test".to_string(),
            supporting_factors: vec![],
            risk_factors: vec![],
            close_fraction: None,
        },
        order_side: OrderSide::Buy,
        amount,
        leverage: 10,
        stop_loss: Some(dec!(2940)),
        take_profit: Some(dec!(3120)),
        reduce_only: false,
        reference_price: dec!(3000),
    }
}

#[tokio::test]
async fn test_stop_loss_close_reason_and_pnl() {
    let h = harness().await;
    let symbols = vec!["ETH/USDT".to_string()];
    h.gateway.set_mark_price("ETH/USDT", dec!(3000)).await;

    // Open a long with protective companions
    let report = h
        .executor
        .execute(&approved_long("ETH/USDT", dec!(1)), None)
        .await
        .unwrap();
    assert!(report.success);
    assert_eq!(report.companions.len(), 2);

    // First sync adopts the position and its protective claims
    let sync1 = h.synchronizer.sync_tick(&symbols).await.unwrap();
    assert_eq!(sync1.opened, 1);
    let open = h.repos.positions.find_open("binance").await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].stop_loss, Some(dec!(2940)));
    assert_eq!(open[0].take_profit, Some(dec!(3120)));

    // Price crosses the stop: the venue fills the reduce-only stop
    h.gateway.set_mark_price("ETH/USDT", dec!(2939)).await;
    assert!(h.gateway.fetch_positions().await.unwrap().is_empty());

    // Second sync observes local-open / exchange-absent and classifies
    let sync2 = h.synchronizer.sync_tick(&symbols).await.unwrap();
    assert_eq!(sync2.closed, 1);

    let closed = h
        .repos
        .positions
        .closed_since("binance", Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(closed.len(), 1);
    let record = &closed[0];
    assert_eq!(record.close_reason, CloseReason::StopLoss);
    // Stop filled at its trigger price 2940; taker fee 0.04% of 2940
    assert_eq!(record.exit_price, dec!(2940));
    assert_eq!(record.fee, dec!(1.1760));
    assert_eq!(record.realized_pnl, dec!(-61.1760));
    assert!(record.holding_duration_secs >= 0);
    assert!(record.exit_time >= record.opened_at);

    // Position book is clean and the close snapshot was archived
    assert!(h.repos.positions.find_open("binance").await.unwrap().is_empty());
    let snapshots: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM portfolio_snapshots WHERE archive_reason = 'close'")
            .fetch_one(&h.repos.database.pool)
            .await
            .unwrap();
    assert_eq!(snapshots.0, 1);
}

#[tokio::test]
async fn test_hedge_mode_coexisting_sides() {
    let h = harness().await;
    let symbols = vec!["BTC/USDT".to_string()];
    h.gateway.set_mark_price("BTC/USDT", dec!(50000)).await;

    // Long 0.10 and short 0.05 on the same symbol
    let mut long = approved_long("BTC/USDT", dec!(0.10));
    long.signal.suggested_price = Some(dec!(50000));
    long.stop_loss = None;
    long.take_profit = None;
    long.reference_price = dec!(50000);
    h.executor.execute(&long, None).await.unwrap();

    let short = ApprovedOrder {
        signal: TradingSignal {
            symbol: "BTC/USDT".to_string(),
            signal_type: SignalType::EnterShort,
            confidence: 0.8,
            suggested_price: Some(dec!(50000)),
            suggested_amount: Some(dec!(0.05)),
            leverage: Some(10),
            stop_loss: None,
            take_profit: None,
            reasoning: "hedge".to_string(),
            supporting_factors: vec![],
            risk_factors: vec![],
            close_fraction: None,
        },
        order_side: OrderSide::Sell,
        amount: dec!(0.05),
        leverage: 10,
        stop_loss: None,
        take_profit: None,
        reduce_only: false,
        reference_price: dec!(50000),
    };
    h.executor.execute(&short, None).await.unwrap();

    let report = h.synchronizer.sync_tick(&symbols).await.unwrap();
    assert_eq!(report.opened, 2);

    // Two independent rows, one per side; the unique index is satisfied
    let open = h.repos.positions.find_open("binance").await.unwrap();
    assert_eq!(open.len(), 2);
    let long_row = open.iter().find(|p| p.side == OrderSide::Buy).unwrap();
    let short_row = open.iter().find(|p| p.side == OrderSide::Sell).unwrap();
    assert_eq!(long_row.amount, dec!(0.10));
    assert_eq!(short_row.amount, dec!(0.05));

    let portfolio = h.portfolio_manager.portfolio().await;
    assert!(portfolio.position("BTC/USDT", OrderSide::Buy).is_some());
    assert!(portfolio.position("BTC/USDT", OrderSide::Sell).is_some());
}

#[tokio::test]
async fn test_self_heal_replaces_lost_stop() {
    let h = harness().await;
    let symbols = vec!["ETH/USDT".to_string()];
    h.gateway.set_mark_price("ETH/USDT", dec!(3000)).await;

    let report = h
        .executor
        .execute(&approved_long("ETH/USDT", dec!(1)), None)
        .await
        .unwrap();
    h.synchronizer.sync_tick(&symbols).await.unwrap();

    // The venue loses the stop order
    let stop = report
        .companions
        .iter()
        .find(|c| c.order_type == OrderType::StopMarket)
        .unwrap();
    h.gateway
        .cancel_order(stop.id.as_deref().unwrap(), "ETH/USDT")
        .await
        .unwrap();
    assert_eq!(h.gateway.fetch_open_orders(None).await.unwrap().len(), 1);

    // Next sync notices the local claim without a venue order and re-arms
    let healed = h.synchronizer.sync_tick(&symbols).await.unwrap();
    assert_eq!(healed.healed, 1);
    let open_orders = h.gateway.fetch_open_orders(None).await.unwrap();
    assert_eq!(open_orders.len(), 2);
    assert!(
        open_orders
            .iter()
            .any(|o| o.order_type == OrderType::StopMarket && o.stop_price == Some(dec!(2940)))
    );
}

#[tokio::test]
async fn test_partial_close_keeps_entry_vwap() {
    let h = harness().await;
    let symbols = vec!["ETH/USDT".to_string()];
    h.gateway.set_mark_price("ETH/USDT", dec!(3000)).await;

    let mut long = approved_long("ETH/USDT", dec!(2));
    long.stop_loss = None;
    long.take_profit = None;
    h.executor.execute(&long, None).await.unwrap();
    h.synchronizer.sync_tick(&symbols).await.unwrap();

    // Reduce half directly on the venue (a manual partial close)
    let exit = ApprovedOrder {
        signal: TradingSignal {
            symbol: "ETH/USDT".to_string(),
            signal_type: SignalType::ExitLong,
            confidence: 0.9,
            suggested_price: None,
            suggested_amount: None,
            leverage: None,
            stop_loss: None,
            take_profit: None,
            reasoning: "trim".to_string(),
            supporting_factors: vec![],
            risk_factors: vec![],
            close_fraction: Some(0.5),
        },
        order_side: OrderSide::Sell,
        amount: dec!(1),
        leverage: 10,
        stop_loss: None,
        take_profit: None,
        reduce_only: true,
        reference_price: dec!(3000),
    };
    h.executor.execute(&exit, None).await.unwrap();

    let report = h.synchronizer.sync_tick(&symbols).await.unwrap();
    assert_eq!(report.reduced, 1);

    let open = h.repos.positions.find_open("binance").await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].amount, dec!(1));
    assert_eq!(open[0].entry_price, dec!(3000));
}

#[tokio::test]
async fn test_liquidation_close_reason() {
    let h = harness().await;
    let symbols = vec!["BTC/USDT".to_string()];
    h.gateway.set_mark_price("BTC/USDT", dec!(50000)).await;

    let mut long = approved_long("BTC/USDT", dec!(0.1));
    long.stop_loss = None;
    long.take_profit = None;
    h.executor.execute(&long, None).await.unwrap();
    h.synchronizer.sync_tick(&symbols).await.unwrap();

    h.gateway
        .force_liquidate("BTC/USDT", OrderSide::Buy, dec!(42000))
        .await;
    let report = h.synchronizer.sync_tick(&symbols).await.unwrap();
    assert_eq!(report.closed, 1);

    let closed = h
        .repos
        .positions
        .closed_since("binance", Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(closed[0].close_reason, CloseReason::Liquidation);
    assert!(closed[0].realized_pnl < rust_decimal::Decimal::ZERO);
}
