//! Single-slot store for the live regime.
//!
//! Written only by the Strategist; the Trader and Coordinator read
//! clones, so a published regime is immutable for its whole window.

use crate::domain::market::regime::MarketRegime;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;

pub struct RegimeStore {
    slot: RwLock<Option<MarketRegime>>,
}

impl RegimeStore {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    pub async fn put(&self, regime: MarketRegime) {
        info!(
            regime = %regime.regime,
            mode = %regime.trading_mode,
            valid_until = %regime.expires_at(),
            "Regime published"
        );
        *self.slot.write().await = Some(regime);
    }

    pub async fn get(&self) -> Option<MarketRegime> {
        self.slot.read().await.clone()
    }

    pub async fn is_valid(&self) -> bool {
        self.current_valid().await.is_some()
    }

    /// The regime, only while inside its validity window.
    pub async fn current_valid(&self) -> Option<MarketRegime> {
        let now = Utc::now();
        self.slot
            .read()
            .await
            .clone()
            .filter(|regime| regime.is_valid_at(now))
    }
}

impl Default for RegimeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_empty_store() {
        let store = RegimeStore::new();
        assert!(store.get().await.is_none());
        assert!(!store.is_valid().await);
    }

    #[tokio::test]
    async fn test_put_and_validity_window() {
        let store = RegimeStore::new();
        let mut regime = MarketRegime::conservative_default(Utc::now());
        store.put(regime.clone()).await;
        assert!(store.is_valid().await);
        assert!(store.current_valid().await.is_some());

        // An expired regime stays readable but is no longer valid
        regime.created_at = Utc::now() - Duration::hours(3);
        regime.valid_until = Some(Utc::now() - Duration::hours(2));
        store.put(regime).await;
        assert!(store.get().await.is_some());
        assert!(store.current_valid().await.is_none());
    }
}
