//! Coordinator: owns the perception, strategist, trader and sync loops.
//!
//! Every loop body is wrapped so a failing tick logs and the next tick
//! proceeds; only startup wiring errors abort. Shutdown cancels the
//! loops in reverse order (sync, trader, strategist, perception) and
//! waits out the grace period for in-flight work.

use crate::application::environment::EnvironmentBuilder;
use crate::application::execution::OrderExecutor;
use crate::application::market_data::snapshot_builder::SnapshotBuilder;
use crate::application::portfolio_manager::PortfolioManager;
use crate::application::regime_store::RegimeStore;
use crate::application::risk::RiskManager;
use crate::application::strategist::Strategist;
use crate::application::sync::AccountSynchronizer;
use crate::application::trader::Trader;
use crate::domain::decision::DecisionOutcome;
use crate::domain::repositories::DecisionRepository;
use crate::domain::trading::signal::SignalType;
use anyhow::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub strategist_interval: Duration,
    pub trader_interval: Duration,
    pub perception_interval: Duration,
    pub environment_interval: Duration,
    pub sync_interval: Duration,
    pub max_concurrent_orders: usize,
    pub shutdown_grace: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            strategist_interval: Duration::from_secs(3600),
            trader_interval: Duration::from_secs(180),
            perception_interval: Duration::from_secs(5),
            environment_interval: Duration::from_secs(1800),
            sync_interval: Duration::from_secs(10),
            max_concurrent_orders: 5,
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

pub struct Coordinator {
    pub snapshot_builder: Arc<SnapshotBuilder>,
    pub environment_builder: Arc<EnvironmentBuilder>,
    pub strategist: Arc<Strategist>,
    pub trader: Arc<Trader>,
    pub risk_manager: Arc<RiskManager>,
    pub executor: Arc<OrderExecutor>,
    pub synchronizer: Arc<AccountSynchronizer>,
    pub portfolio_manager: Arc<PortfolioManager>,
    pub regime_store: Arc<RegimeStore>,
    pub decisions: Arc<dyn DecisionRepository>,
    pub symbols: Vec<String>,
    pub config: CoordinatorConfig,
}

pub struct CoordinatorHandle {
    shutdown_tx: watch::Sender<bool>,
    /// Joined in this order at shutdown: sync, trader, strategist,
    /// perception.
    handles: Vec<(&'static str, JoinHandle<()>)>,
    grace: Duration,
}

impl CoordinatorHandle {
    pub async fn stop(self) {
        info!("Shutdown requested; cancelling tasks");
        let _ = self.shutdown_tx.send(true);

        for (name, handle) in self.handles {
            let abort = handle.abort_handle();
            match timeout(self.grace, handle).await {
                Ok(_) => info!("{name} task stopped"),
                Err(_) => {
                    warn!("{name} task exceeded the shutdown grace; aborting");
                    abort.abort();
                }
            }
        }
        info!("All coordinator tasks stopped");
    }
}

impl Coordinator {
    /// Start the four loops. Startup runs the pending-order
    /// reconciliation and a first sync before any trading tick fires.
    pub async fn start(self: Arc<Self>) -> Result<CoordinatorHandle> {
        info!(symbols = ?self.symbols, "Coordinator starting");
        self.snapshot_builder.set_tracked(&self.symbols).await;

        if let Err(e) = self.executor.reconcile_pending_on_startup().await {
            warn!("Startup order reconciliation failed: {e:#}");
        }
        if let Err(e) = self.synchronizer.sync_tick(&self.symbols).await {
            warn!("Initial account sync failed: {e:#}");
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let force_refresh = Arc::new(Notify::new());

        let perception = self.clone().spawn_perception(shutdown_rx.clone());
        let strategist = self
            .clone()
            .spawn_strategist(shutdown_rx.clone(), force_refresh.clone());
        let trader = self
            .clone()
            .spawn_trader(shutdown_rx.clone(), force_refresh.clone());
        let sync = self.clone().spawn_sync(shutdown_rx);

        Ok(CoordinatorHandle {
            shutdown_tx,
            handles: vec![
                ("sync", sync),
                ("trader", trader),
                ("strategist", strategist),
                ("perception", perception),
            ],
            grace: self.config.shutdown_grace,
        })
    }

    fn spawn_perception(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut snapshot_tick = interval(self.config.perception_interval);
            snapshot_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut environment_tick = interval(self.config.environment_interval);
            environment_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!("Perception task started");
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = snapshot_tick.tick() => {
                        let refreshed = self.snapshot_builder.refresh_all().await;
                        if refreshed.is_empty() {
                            warn!("Perception tick refreshed no snapshots");
                        }
                    }
                    _ = environment_tick.tick() => {
                        let _ = self.environment_builder.rebuild().await;
                    }
                }
            }
            info!("Perception task exiting");
        })
    }

    fn spawn_strategist(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
        force_refresh: Arc<Notify>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = interval(self.config.strategist_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!("Strategist task started");
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tick.tick() => self.strategist_tick().await,
                    _ = force_refresh.notified() => {
                        info!("Forced strategist refresh requested");
                        self.strategist_tick().await;
                    }
                }
            }
            info!("Strategist task exiting");
        })
    }

    async fn strategist_tick(&self) {
        let environment = self.environment_builder.environment().await;
        let portfolio = self.portfolio_manager.portfolio().await;
        let symbol_index = self.snapshot_builder.symbol_index().await;

        if let Err(e) = self
            .strategist
            .run_tick(&environment, &portfolio, &symbol_index)
            .await
        {
            warn!("Strategist tick degraded: {e}");
        }
    }

    fn spawn_trader(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
        force_refresh: Arc<Notify>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = interval(self.config.trader_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let order_semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_orders));

            info!("Trader task started");
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tick.tick() => {
                        self.trader_tick(&order_semaphore, &force_refresh).await;
                    }
                }
            }
            info!("Trader task exiting");
        })
    }

    /// One tactical tick: freeze inputs, run the batch, then push each
    /// non-hold signal through risk and execution concurrently, bounded
    /// by the order semaphore. Per-symbol failures never abort the batch.
    async fn trader_tick(&self, order_semaphore: &Arc<Semaphore>, force_refresh: &Arc<Notify>) {
        // Frozen copies for the whole tick.
        let Some(regime) = self.regime_store.current_valid().await else {
            info!("No valid regime; skipping trader tick and requesting a strategist refresh");
            force_refresh.notify_one();
            return;
        };
        let snapshots = self.snapshot_builder.tradeable_snapshots(&self.symbols).await;
        let portfolio = self.portfolio_manager.portfolio().await;

        let result = self.trader.run_tick(&regime, &snapshots, &portfolio).await;
        let actionable: Vec<_> = result
            .signals
            .into_iter()
            .filter(|s| s.signal_type != SignalType::Hold)
            .collect();
        if actionable.is_empty() {
            return;
        }
        info!("Trader produced {} actionable signals", actionable.len());

        let daily_pnl = match self.portfolio_manager.daily_pnl(Utc::now()).await {
            Ok(pnl) => pnl,
            Err(e) => {
                error!("Daily PnL computation failed; treating as flat: {e:#}");
                Decimal::ZERO
            }
        };

        let tasks = actionable.into_iter().map(|signal| {
            let semaphore = order_semaphore.clone();
            let regime = regime.clone();
            let portfolio = portfolio.clone();
            let decision_id = result.decision_id;
            async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };
                let verdict = self
                    .risk_manager
                    .evaluate(&signal, &regime, &portfolio, daily_pnl)
                    .await;
                if !verdict.passed {
                    let reason = verdict.reason.unwrap_or_default();
                    info!(symbol = %signal.symbol, %reason, "Signal blocked by risk");
                    if let Some(id) = decision_id {
                        let _ = self
                            .decisions
                            .update_outcome(id, DecisionOutcome::RiskBlocked, Some(&reason))
                            .await;
                    }
                    return;
                }
                let Some(approved) = verdict.order else {
                    return;
                };
                match self.executor.execute(&approved, decision_id).await {
                    Ok(report) if !report.success => {
                        warn!(symbol = %approved.signal.symbol, "Execution rejected by the venue");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(symbol = %approved.signal.symbol, "Execution failed: {e:#}");
                    }
                }
            }
        });
        futures::future::join_all(tasks).await;
    }

    fn spawn_sync(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = interval(self.config.sync_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!("Sync task started");
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tick.tick() => {
                        if let Err(e) = self.synchronizer.sync_tick(&self.symbols).await {
                            warn!("Sync tick failed: {e:#}");
                        }
                    }
                }
            }
            info!("Sync task exiting");
        })
    }
}
