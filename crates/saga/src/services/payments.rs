//! Finding the payment recorded for an order.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use event_store::EventStore;
use projections::{PaymentLedgerView, ProjectionProcessor};
use tokio::sync::RwLock;

use crate::error::SagaError;

#[async_trait]
pub trait PaymentLookup: Send + Sync {
    async fn payment_for_order(
        &self,
        order_id: AggregateId,
    ) -> Result<Option<AggregateId>, SagaError>;
}

/// Reads the payment ledger projection after bringing it up to date.
pub struct ProjectedPaymentLookup<S: EventStore> {
    processor: Arc<ProjectionProcessor<S>>,
    view: PaymentLedgerView,
}

impl<S: EventStore> ProjectedPaymentLookup<S> {
    /// `view` must be registered with `processor`.
    pub fn new(processor: Arc<ProjectionProcessor<S>>, view: PaymentLedgerView) -> Self {
        Self { processor, view }
    }
}

#[async_trait]
impl<S: EventStore> PaymentLookup for ProjectedPaymentLookup<S> {
    async fn payment_for_order(
        &self,
        order_id: AggregateId,
    ) -> Result<Option<AggregateId>, SagaError> {
        self.processor.run_catch_up().await?;
        Ok(self.view.by_order(order_id).await.map(|p| p.id))
    }
}

#[derive(Debug, Default)]
struct LookupState {
    payments: HashMap<AggregateId, AggregateId>,
    fail: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentLookup {
    state: Arc<RwLock<LookupState>>,
}

impl InMemoryPaymentLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, order_id: AggregateId, payment_id: AggregateId) {
        self.state.write().await.payments.insert(order_id, payment_id);
    }

    pub async fn set_fail(&self, fail: bool) {
        self.state.write().await.fail = fail;
    }
}

#[async_trait]
impl PaymentLookup for InMemoryPaymentLookup {
    async fn payment_for_order(
        &self,
        order_id: AggregateId,
    ) -> Result<Option<AggregateId>, SagaError> {
        let state = self.state.read().await;
        if state.fail {
            return Err(SagaError::Upstream("payment lookup failed".to_string()));
        }
        Ok(state.payments.get(&order_id).copied())
    }
}
