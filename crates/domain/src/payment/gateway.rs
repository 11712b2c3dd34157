//! Settlement gateway abstraction.

use async_trait::async_trait;
use uuid::Uuid;

use crate::value_objects::Money;

/// What the gateway is asked to settle.
#[derive(Debug, Clone)]
pub struct SettlementRequest {
    pub payment_id: String,
    pub amount: Money,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    Approved { transaction_id: String },
    Declined { error_message: String },
}

/// The payment network. Called exactly once per processing attempt.
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    async fn settle(&self, request: &SettlementRequest) -> SettlementOutcome;
}

/// Approves everything up to a fixed ceiling.
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    limit: Money,
}

impl SimulatedGateway {
    pub const DEFAULT_LIMIT_UNITS: i64 = 10_000;

    /// `limit_units` is in whole currency units, so 10_000 means 10,000.00.
    pub fn new(limit_units: i64) -> Self {
        Self {
            limit: Money::from_cents(limit_units.saturating_mul(100)),
        }
    }

    pub fn limit(&self) -> Money {
        self.limit
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT_UNITS)
    }
}

#[async_trait]
impl SettlementGateway for SimulatedGateway {
    async fn settle(&self, request: &SettlementRequest) -> SettlementOutcome {
        if request.amount > self.limit {
            tracing::info!(
                payment_id = %request.payment_id,
                amount = %request.amount,
                "settlement declined"
            );
            return SettlementOutcome::Declined {
                error_message: "amount exceeds limit".to_string(),
            };
        }

        SettlementOutcome::Approved {
            transaction_id: format!("TXN-{}", Uuid::new_v4()),
        }
    }
}
