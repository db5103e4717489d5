use thiserror::Error;

/// Errors raised by the exchange gateway. Venue-native failures are always
/// wrapped into one of these variants; callers never see the raw error.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Network failure talking to {venue}: {reason}")]
    Network { venue: String, reason: String },

    #[error("Exchange rejected the request ({code}): {message}")]
    Exchange { code: i64, message: String },

    #[error("Rate limited by {venue}, retry after {retry_after_secs}s")]
    RateLimited { venue: String, retry_after_secs: u64 },

    #[error("Order not found: {order_id} ({symbol})")]
    OrderNotFound { order_id: String, symbol: String },
}

impl GatewayError {
    /// Transient faults are worth retrying; venue rejections are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Network { .. } | GatewayError::RateLimited { .. }
        )
    }

    pub fn is_order_rejection(&self) -> bool {
        matches!(self, GatewayError::Exchange { .. })
    }
}

/// Errors raised by the decision layers (Strategist / Trader). These are
/// absorbed at the task boundary and never propagate to the coordinator.
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("Model call timed out after {timeout_secs}s")]
    ModelTimeout { timeout_secs: u64 },

    #[error("Model provider error: {reason}")]
    Provider { reason: String },

    #[error("Model output is not parseable JSON: {snippet}")]
    InvalidJson { snippet: String },

    #[error("Model output violates consistency invariants: {violations:?}")]
    InvariantViolation { violations: Vec<String> },
}

/// Configuration validation failures surfaced at startup.
#[derive(Debug, Error)]
pub enum RiskConfigError {
    #[error("Invalid risk configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_retryability() {
        let network = GatewayError::Network {
            venue: "binance".to_string(),
            reason: "connection reset".to_string(),
        };
        assert!(network.is_retryable());

        let rejection = GatewayError::Exchange {
            code: -2019,
            message: "Margin is insufficient".to_string(),
        };
        assert!(!rejection.is_retryable());
        assert!(rejection.is_order_rejection());
    }

    #[test]
    fn test_decision_error_formatting() {
        let err = DecisionError::InvalidJson {
            snippet: "not json".to_string(),
        };
        assert!(err.to_string().contains("not json"));
    }
}
