//! Payments by order and by user.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, UserId};
use domain::{Aggregate, Payment, PaymentEvent, PaymentView};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::{Page, PageRequest, ReadModel};

#[derive(Debug, Clone, Serialize)]
pub struct PaymentPage {
    pub payments: Vec<PaymentView>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
}

impl From<Page<PaymentView>> for PaymentPage {
    fn from(page: Page<PaymentView>) -> Self {
        Self {
            payments: page.items,
            total: page.total,
            page: page.page,
            limit: page.limit,
        }
    }
}

#[derive(Default)]
struct PaymentLedgerState {
    payments: HashMap<AggregateId, (u64, Payment)>,
    /// Every payment recorded against an order, oldest first.
    by_order: HashMap<AggregateId, Vec<AggregateId>>,
    next_seq: u64,
    position: ProjectionPosition,
}

impl PaymentLedgerState {
    fn newest_first(&self, keep: impl Fn(&Payment) -> bool) -> Vec<PaymentView> {
        let mut matching: Vec<_> = self.payments.values().filter(|(_, p)| keep(p)).collect();
        matching.sort_by(|a, b| b.0.cmp(&a.0));
        matching.into_iter().filter_map(|(_, p)| p.to_view()).collect()
    }
}

/// Folds `Payment` streams into views keyed by order and user.
#[derive(Clone, Default)]
pub struct PaymentLedgerView {
    state: Arc<RwLock<PaymentLedgerState>>,
}

impl PaymentLedgerView {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent payment created for `order_id`.
    pub async fn by_order(&self, order_id: AggregateId) -> Option<PaymentView> {
        let state = self.state.read().await;
        let latest = state.by_order.get(&order_id)?.last()?;
        state.payments.get(latest).and_then(|(_, p)| p.to_view())
    }

    pub async fn has_payment_for(&self, order_id: AggregateId) -> bool {
        self.state.read().await.by_order.contains_key(&order_id)
    }

    pub async fn by_user(&self, user_id: UserId, page: PageRequest) -> PaymentPage {
        let state = self.state.read().await;
        page.apply(state.newest_first(|p| p.user_id() == Some(user_id)))
            .into()
    }

    pub async fn all(&self, page: PageRequest) -> PaymentPage {
        let state = self.state.read().await;
        page.apply(state.newest_first(|_| true)).into()
    }
}

#[async_trait]
impl Projection for PaymentLedgerView {
    fn name(&self) -> &'static str {
        "PaymentLedgerView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;
        state.position = state.position.advance_to(event.position);

        if event.aggregate_type != Payment::aggregate_type() {
            return Ok(());
        }

        let payment_id = event.aggregate_id;
        let payment_event: PaymentEvent = event.decode()?;

        if let PaymentEvent::PaymentCreated(data) = &payment_event
            && !state.payments.contains_key(&payment_id)
        {
            state.next_seq += 1;
            let seq = state.next_seq;
            state.payments.insert(payment_id, (seq, Payment::default()));
            state
                .by_order
                .entry(data.order_id)
                .or_default()
                .push(payment_id);
        }

        if let Some((_, payment)) = state.payments.get_mut(&payment_id) {
            payment.apply(payment_event);
            payment.set_version(event.version);
        }
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = PaymentLedgerState::default();
        Ok(())
    }
}

impl ReadModel for PaymentLedgerView {
    fn name(&self) -> &'static str {
        "PaymentLedgerView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.payments.len()).unwrap_or(0)
    }
}
