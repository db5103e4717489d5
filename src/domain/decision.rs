use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which decision layer produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionLayer {
    Strategic,
    Tactical,
}

impl fmt::Display for DecisionLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionLayer::Strategic => write!(f, "strategic"),
            DecisionLayer::Tactical => write!(f, "tactical"),
        }
    }
}

/// Terminal state of a decision, back-annotated as the pipeline learns
/// what happened to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    Ok,
    ParseFailure,
    InvariantViolation,
    RiskBlocked,
    ExecutionFailed,
}

impl fmt::Display for DecisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DecisionOutcome::Ok => "ok",
            DecisionOutcome::ParseFailure => "parse_failure",
            DecisionOutcome::InvariantViolation => "invariant_violation",
            DecisionOutcome::RiskBlocked => "risk_blocked",
            DecisionOutcome::ExecutionFailed => "execution_failed",
        };
        write!(f, "{}", s)
    }
}

/// Audit row written for every Strategist run and every Trader batch.
/// Orders created from a decision carry its id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: Option<i64>,
    pub layer: DecisionLayer,
    /// Digest of the inputs that went into the prompt.
    pub input_digest: serde_json::Value,
    pub prompt_style: String,
    pub model_used: String,
    pub tokens_used: Option<u32>,
    pub latency_ms: u64,
    pub raw_output: String,
    pub parsed_output: Option<serde_json::Value>,
    pub outcome: DecisionOutcome,
    pub created_at: DateTime<Utc>,
}

impl DecisionRecord {
    pub fn new(layer: DecisionLayer, input_digest: serde_json::Value, prompt_style: &str) -> Self {
        Self {
            id: None,
            layer,
            input_digest,
            prompt_style: prompt_style.to_string(),
            model_used: String::new(),
            tokens_used: None,
            latency_ms: 0,
            raw_output: String::new(),
            parsed_output: None,
            outcome: DecisionOutcome::Ok,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_tags() {
        assert_eq!(DecisionOutcome::ParseFailure.to_string(), "parse_failure");
        assert_eq!(
            DecisionOutcome::InvariantViolation.to_string(),
            "invariant_violation"
        );
    }

    #[test]
    fn test_layer_serde() {
        assert_eq!(
            serde_json::to_string(&DecisionLayer::Strategic).unwrap(),
            "\"strategic\""
        );
        let layer: DecisionLayer = serde_json::from_str("\"tactical\"").unwrap();
        assert_eq!(layer, DecisionLayer::Tactical);
    }
}
