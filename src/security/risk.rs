//! External risk engine call-out
//!
//! The scoring service is a network dependency and is treated as unreliable:
//! every call is bounded by a timeout, and an unreachable engine resolves
//! through the configured fail-open/fail-closed policy in the transfer
//! engine — never silently.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Verdict action returned by the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskAction {
    Allow,
    Block,
}

/// Scoring result: an action plus the engine's risk level label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskVerdict {
    pub risk_level: String,
    pub action: RiskAction,
}

/// Transient evaluator failure (network, timeout, bad payload).
#[derive(Error, Debug)]
pub enum RiskError {
    #[error("risk engine unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait RiskEvaluator: Send + Sync {
    async fn evaluate(&self, identity: &str, amount: Decimal) -> Result<RiskVerdict, RiskError>;
}

#[derive(Serialize)]
struct RiskRequest<'a> {
    username: &'a str,
    amount: Decimal,
}

/// JSON POST to an external scoring endpoint.
pub struct HttpRiskEvaluator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRiskEvaluator {
    pub fn new(endpoint: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl RiskEvaluator for HttpRiskEvaluator {
    async fn evaluate(&self, identity: &str, amount: Decimal) -> Result<RiskVerdict, RiskError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RiskRequest {
                username: identity,
                amount,
            })
            .send()
            .await
            .map_err(|e| RiskError::Unavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| RiskError::Unavailable(e.to_string()))?;

        let verdict: RiskVerdict = response
            .json()
            .await
            .map_err(|e| RiskError::Unavailable(format!("bad verdict payload: {}", e)))?;

        debug!(
            identity,
            level = %verdict.risk_level,
            action = ?verdict.action,
            "risk verdict"
        );
        Ok(verdict)
    }
}

/// Fixed-verdict evaluator for tests and deployments without a scorer.
pub struct StaticRiskEvaluator {
    action: RiskAction,
}

impl StaticRiskEvaluator {
    pub fn allow() -> Self {
        Self {
            action: RiskAction::Allow,
        }
    }

    pub fn block() -> Self {
        Self {
            action: RiskAction::Block,
        }
    }
}

#[async_trait]
impl RiskEvaluator for StaticRiskEvaluator {
    async fn evaluate(&self, _identity: &str, _amount: Decimal) -> Result<RiskVerdict, RiskError> {
        Ok(RiskVerdict {
            risk_level: "STATIC".to_string(),
            action: self.action,
        })
    }
}
