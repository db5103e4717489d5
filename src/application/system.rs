//! Application wiring: builds every component from the configuration and
//! hands ownership of the loops to the coordinator.

use crate::application::coordinator::{Coordinator, CoordinatorConfig, CoordinatorHandle};
use crate::application::environment::EnvironmentBuilder;
use crate::application::environment::news_digest::NewsDigester;
use crate::application::execution::{InstrumentLocks, OrderExecutor};
use crate::application::market_data::indicators::IndicatorConfig;
use crate::application::market_data::snapshot_builder::{SnapshotBuilder, SnapshotBuilderConfig};
use crate::application::portfolio_manager::PortfolioManager;
use crate::application::regime_store::RegimeStore;
use crate::application::risk::{
    CircuitBreakerConfig, DailyCircuitBreaker, RiskConfig, RiskManager,
};
use crate::application::strategist::prompts::PromptStyle;
use crate::application::strategist::{Strategist, StrategistConfig};
use crate::application::sync::AccountSynchronizer;
use crate::application::trader::{Trader, TraderConfig};
use crate::config::Config;
use crate::domain::ports::{ChatModel, ExchangeGateway};
use crate::domain::repositories::{AccountSettingsRepository, DecisionRepository};
use crate::domain::trading::portfolio::AccountSettings;
use crate::domain::trading::symbol::{SymbolMapper, VenueSymbolRule};
use crate::infrastructure::datasources::crypto_overview::CoinGeckoOverview;
use crate::infrastructure::datasources::fear_greed::AlternativeMeFearGreed;
use crate::infrastructure::datasources::macro_feed::{EnvEquityProvider, EnvMacroProvider};
use crate::infrastructure::datasources::news_feed::RssNewsProvider;
use crate::infrastructure::exchange::binance::BinanceFuturesGateway;
use crate::infrastructure::exchange::paper::PaperGateway;
use crate::infrastructure::llm::client::{ModelProvider, OpenAiCompatClient};
use crate::infrastructure::persistence::Database;
use crate::infrastructure::persistence::repositories::{
    SqliteAccountSettingsRepository, SqliteDecisionRepository, SqliteKlineRepository,
    SqliteOrderRepository, SqlitePositionRepository, SqliteSnapshotRepository,
    SqliteTradeRepository,
};
use anyhow::{Context, Result};
use chrono::Utc;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct Application {
    pub config: Config,
    pub database: Database,
    pub coordinator: Arc<Coordinator>,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self> {
        info!(
            exchange = %config.exchange.trading_exchange,
            live = config.exchange.enable_trading,
            "Building application"
        );
        if !config.exchange.futures {
            anyhow::bail!("spot trading is not supported; set FUTURES=true");
        }

        // Persistence
        let database = Database::new(&config.database_url).await?;
        let orders = Arc::new(SqliteOrderRepository::new(database.pool.clone()));
        let trades = Arc::new(SqliteTradeRepository::new(database.pool.clone()));
        let positions = Arc::new(SqlitePositionRepository::new(database.pool.clone()));
        let snapshots = Arc::new(SqliteSnapshotRepository::new(database.pool.clone()));
        let decisions: Arc<dyn DecisionRepository> =
            Arc::new(SqliteDecisionRepository::new(database.pool.clone()));
        let klines = Arc::new(SqliteKlineRepository::new(database.pool.clone()));
        let account_settings = SqliteAccountSettingsRepository::new(database.pool.clone());

        let exchange_id = config.exchange.trading_exchange.clone();
        database
            .register_exchange(&exchange_id, &exchange_id)
            .await?;
        let settings = account_settings
            .init_if_missing(&AccountSettings {
                exchange_id: exchange_id.clone(),
                initial_capital: config.exchange.initial_capital,
                capital_currency: "USDT".to_string(),
                set_at: Utc::now(),
            })
            .await?;
        info!(
            initial_capital = %settings.initial_capital,
            "Account baseline loaded"
        );

        // Exchange gateway; live trading must be opted into explicitly.
        let mapper = SymbolMapper::new(VenueSymbolRule::binance_futures());
        let binance: Arc<dyn ExchangeGateway> = Arc::new(BinanceFuturesGateway::new(
            config.exchange.api_key.clone(),
            config.exchange.api_secret.clone(),
            config.exchange.base_url.clone(),
            mapper,
            config.exchange.rate_limit_per_sec,
            Duration::from_secs(config.exchange.call_timeout_secs),
        ));
        let gateway: Arc<dyn ExchangeGateway> = if config.exchange.enable_trading {
            binance
        } else {
            info!("Live trading disabled; orders route to the paper gateway");
            Arc::new(PaperGateway::new(
                Some(binance),
                config.exchange.paper_starting_balance,
            ))
        };

        // Decision model
        let provider = ModelProvider::parse(&config.model.provider)
            .with_context(|| format!("unknown model provider: {}", config.model.provider))?;
        let model: Arc<dyn ChatModel> = Arc::new(OpenAiCompatClient::new(
            provider,
            config.model.base_url.clone(),
            config.model.api_key.clone(),
            config.model.model_name.clone(),
            config.model.timeout_secs,
        ));

        // Perception
        let snapshot_builder = Arc::new(SnapshotBuilder::new(
            gateway.clone(),
            Some(klines),
            exchange_id.clone(),
            SnapshotBuilderConfig {
                primary_timeframe: config.primary_timeframe,
                candle_window: config.candle_window,
                snapshot_ttl: Duration::from_secs(config.schedule.snapshot_ttl_secs),
                max_snapshot_age_secs: config.schedule.max_snapshot_age_secs,
                max_concurrent_fetches: config.schedule.max_concurrent_fetches,
                indicators: IndicatorConfig::default(),
            },
        ));

        let digester = config
            .model
            .news_digest_enabled
            .then(|| NewsDigester::new(model.clone(), 1024));
        let environment_builder = Arc::new(EnvironmentBuilder::new(
            Some(Arc::new(EnvMacroProvider)),
            Some(Arc::new(EnvEquityProvider)),
            Some(Arc::new(AlternativeMeFearGreed::new())),
            Some(Arc::new(CoinGeckoOverview::new())),
            config
                .news_feed_url
                .as_deref()
                .map(|url| Arc::new(RssNewsProvider::new(url)) as _),
            digester,
            gateway.clone(),
            Duration::from_secs(config.schedule.environment_ttl_secs),
            Duration::from_secs(config.schedule.per_source_timeout_secs),
        ));

        // Decision layers
        let regime_store = Arc::new(RegimeStore::new());
        let prompt_style = PromptStyle::from_str(&config.model.prompt_style)?;
        let strategist = Arc::new(Strategist::new(
            model.clone(),
            regime_store.clone(),
            decisions.clone(),
            StrategistConfig {
                style: prompt_style,
                max_symbols_to_trade: config.max_symbols_to_trade,
                temperature: config.model.temperature,
                max_tokens: config.model.max_tokens,
            },
        ));
        let trader = Arc::new(Trader::new(
            model,
            decisions.clone(),
            TraderConfig {
                temperature: config.model.temperature,
                max_tokens: config.model.max_tokens,
                prompt_style: prompt_style.as_str().to_string(),
            },
        ));

        // Risk and execution
        let breaker = Arc::new(DailyCircuitBreaker::new(
            CircuitBreakerConfig {
                max_daily_loss: config.risk.max_daily_loss,
                max_drawdown: config.risk.max_drawdown,
            },
            settings.initial_capital,
        ));
        let risk_manager = Arc::new(
            RiskManager::new(
                RiskConfig {
                    max_position_size: config.risk.max_position_size,
                    max_single_trade: config.risk.max_single_trade,
                    stop_loss_pct: config.risk.stop_loss_pct,
                    take_profit_pct: config.risk.take_profit_pct,
                    max_leverage_major: config.risk.max_leverage_major,
                    max_leverage_altcoin: config.risk.max_leverage_altcoin,
                    high_leverage_warning: config.risk.high_leverage_warning,
                    min_stop_distance_pct: config.risk.min_stop_distance_pct,
                    max_stop_distance_pct: config.risk.max_stop_distance_pct,
                    liquidation_safety_margin: config.risk.liquidation_safety_margin,
                    hedge_mode: config.risk.hedge_mode,
                    default_leverage: config.risk.default_leverage,
                },
                breaker,
            )
            .map_err(|e| anyhow::anyhow!("{e}"))?,
        );

        let locks = Arc::new(InstrumentLocks::new());
        let executor = Arc::new(OrderExecutor::new(
            gateway.clone(),
            orders.clone(),
            decisions.clone(),
            locks.clone(),
        ));

        let portfolio_manager = Arc::new(PortfolioManager::new(
            positions.clone(),
            exchange_id.clone(),
        ));
        let synchronizer = Arc::new(AccountSynchronizer::new(
            gateway,
            positions,
            trades,
            orders,
            snapshots,
            portfolio_manager.clone(),
            locks,
            exchange_id,
        ));

        let coordinator = Arc::new(Coordinator {
            snapshot_builder,
            environment_builder,
            strategist,
            trader,
            risk_manager,
            executor,
            synchronizer,
            portfolio_manager,
            regime_store,
            decisions,
            symbols: config.symbols.clone(),
            config: CoordinatorConfig {
                strategist_interval: Duration::from_secs(config.schedule.strategist_interval_secs),
                trader_interval: Duration::from_secs(config.schedule.trader_interval_secs),
                perception_interval: Duration::from_secs(config.schedule.perception_interval_secs),
                environment_interval: Duration::from_secs(
                    config.schedule.environment_interval_secs,
                ),
                sync_interval: Duration::from_secs(config.schedule.sync_interval_secs),
                max_concurrent_orders: config.schedule.max_concurrent_orders,
                shutdown_grace: Duration::from_secs(config.schedule.shutdown_grace_secs),
            },
        });

        Ok(Self {
            config,
            database,
            coordinator,
        })
    }

    pub async fn start(&self) -> Result<CoordinatorHandle> {
        self.coordinator.clone().start().await
    }

    /// Flush and close the DAO pool; the last step of shutdown.
    pub async fn close(&self) {
        self.database.close().await;
        info!("Database closed");
    }
}
