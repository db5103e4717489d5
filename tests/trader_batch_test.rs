//! Trader batch behavior: symbol post-matching, confidence gating and
//! whole-batch degradation on bad output.

mod common;

use common::{ScriptedModel, bull_regime, snapshot_map, test_repos};
use perpilot::application::trader::{Trader, TraderConfig};
use perpilot::domain::trading::portfolio::Portfolio;
use perpilot::domain::trading::signal::SignalType;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_missing_symbol_synthesizes_hold() {
    // Regime recommends three bases; the model only answers for two.
    let repos = test_repos().await;
    let regime = bull_regime(&["BTC", "ETH", "SOL"]);
    let snapshots = snapshot_map(&[
        ("BTC/USDT", dec!(50000)),
        ("ETH/USDT", dec!(3000)),
        ("SOL/USDT", dec!(150)),
    ]);

    let response = r#"[
        {"symbol": "BTC/USDT", "signal_type": "enter_long", "confidence": 0.8,
         "suggested_price": 50000, "suggested_amount": 0.01, "leverage": 10,
         "stop_loss": 49000, "take_profit": 52000, "reasoning": "breakout"},
        {"symbol": "ETH/USDT", "signal_type": "hold", "reasoning": "no edge"}
    ]"#;
    let trader = Trader::new(
        ScriptedModel::new(vec![response]),
        repos.decisions.clone(),
        TraderConfig::default(),
    );

    let result = trader
        .run_tick(&regime, &snapshots, &Portfolio::empty())
        .await;
    assert_eq!(result.signals.len(), 3);

    let sol = result
        .signals
        .iter()
        .find(|s| s.symbol == "SOL/USDT")
        .unwrap();
    assert_eq!(sol.signal_type, SignalType::Hold);
    assert_eq!(sol.reasoning, "no response");

    let btc = result
        .signals
        .iter()
        .find(|s| s.symbol == "BTC/USDT")
        .unwrap();
    assert_eq!(btc.signal_type, SignalType::EnterLong);
}

#[tokio::test]
async fn test_bad_json_degrades_whole_batch_to_hold() {
    let repos = test_repos().await;
    let regime = bull_regime(&["BTC", "ETH"]);
    let snapshots = snapshot_map(&[("BTC/USDT", dec!(50000)), ("ETH/USDT", dec!(3000))]);

    let trader = Trader::new(
        ScriptedModel::new(vec!["I refuse to answer in JSON today."]),
        repos.decisions.clone(),
        TraderConfig::default(),
    );
    let result = trader
        .run_tick(&regime, &snapshots, &Portfolio::empty())
        .await;

    assert_eq!(result.signals.len(), 2);
    assert!(
        result
            .signals
            .iter()
            .all(|s| s.signal_type == SignalType::Hold)
    );

    let row: (String,) = sqlx::query_as("SELECT outcome FROM decisions ORDER BY id DESC LIMIT 1")
        .fetch_one(&repos.database.pool)
        .await
        .unwrap();
    assert_eq!(row.0, "parse_failure");
}

#[tokio::test]
async fn test_confidence_below_mode_floor_downgrades() {
    // Normal mode floors entries at 0.70
    let repos = test_repos().await;
    let regime = bull_regime(&["BTC"]);
    let snapshots = snapshot_map(&[("BTC/USDT", dec!(50000))]);

    let response = r#"[
        {"symbol": "BTC/USDT", "signal_type": "enter_long", "confidence": 0.65,
         "suggested_price": 50000, "leverage": 5, "stop_loss": 49000,
         "take_profit": 52000, "reasoning": "weak breakout"}
    ]"#;
    let trader = Trader::new(
        ScriptedModel::new(vec![response]),
        repos.decisions.clone(),
        TraderConfig::default(),
    );
    let result = trader
        .run_tick(&regime, &snapshots, &Portfolio::empty())
        .await;

    assert_eq!(result.signals.len(), 1);
    assert_eq!(result.signals[0].signal_type, SignalType::Hold);
    assert!(result.signals[0].reasoning.contains("below"));
}

#[tokio::test]
async fn test_blacklisted_and_unrecommended_symbols_excluded() {
    let mut regime = bull_regime(&["BTC", "ETH"]);
    regime.blacklist = vec!["ETH".to_string()];
    // DOGE is in the snapshot map but not recommended; ETH is blacklisted
    let snapshots = snapshot_map(&[
        ("BTC/USDT", dec!(50000)),
        ("ETH/USDT", dec!(3000)),
        ("DOGE/USDT", dec!(0.1)),
    ]);

    let symbols = Trader::filter_symbols(&regime, &snapshots);
    assert_eq!(symbols, vec!["BTC/USDT".to_string()]);
}

#[tokio::test]
async fn test_invalid_entry_fields_degrade_that_symbol_only() {
    let repos = test_repos().await;
    let regime = bull_regime(&["BTC", "ETH"]);
    let snapshots = snapshot_map(&[("BTC/USDT", dec!(50000)), ("ETH/USDT", dec!(3000))]);

    // BTC stop sits above the long entry (invalid); ETH is well-formed
    let response = r#"[
        {"symbol": "BTC/USDT", "signal_type": "enter_long", "confidence": 0.9,
         "suggested_price": 50000, "stop_loss": 51000, "reasoning": "bad stop"},
        {"symbol": "ETH/USDT", "signal_type": "enter_long", "confidence": 0.8,
         "suggested_price": 3000, "stop_loss": 2940, "take_profit": 3120,
         "reasoning": "clean setup"}
    ]"#;
    let trader = Trader::new(
        ScriptedModel::new(vec![response]),
        repos.decisions.clone(),
        TraderConfig::default(),
    );
    let result = trader
        .run_tick(&regime, &snapshots, &Portfolio::empty())
        .await;

    let btc = result
        .signals
        .iter()
        .find(|s| s.symbol == "BTC/USDT")
        .unwrap();
    assert_eq!(btc.signal_type, SignalType::Hold);

    let eth = result
        .signals
        .iter()
        .find(|s| s.symbol == "ETH/USDT")
        .unwrap();
    assert_eq!(eth.signal_type, SignalType::EnterLong);
}

#[tokio::test]
async fn test_fenced_batch_output_recovers() {
    let repos = test_repos().await;
    let regime = bull_regime(&["BTC"]);
    let snapshots = snapshot_map(&[("BTC/USDT", dec!(50000))]);

    let response = "Here are my signals:\n```json\n[{\"symbol\": \"BTC/USDT\", \"signal_type\": \"hold\", \"reasoning\": \"chop\"}]\n```";
    let trader = Trader::new(
        ScriptedModel::new(vec![response]),
        repos.decisions.clone(),
        TraderConfig::default(),
    );
    let result = trader
        .run_tick(&regime, &snapshots, &Portfolio::empty())
        .await;
    assert_eq!(result.signals.len(), 1);
    assert_eq!(result.signals[0].reasoning, "chop");
    assert!(result.decision_id.is_some());
}
