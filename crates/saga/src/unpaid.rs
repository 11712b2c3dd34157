//! Checkouts still waiting for a payment.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::Aggregate;
use event_store::EventEnvelope;
use projections::{Projection, ProjectionPosition};
use tokio::sync::RwLock;

use crate::aggregate::CheckoutSaga;
use crate::checkout::STEP_ORDER_CREATED;
use crate::events::CheckoutEvent;

#[derive(Default)]
struct UnpaidState {
    deadlines: HashMap<AggregateId, DateTime<Utc>>,
    position: ProjectionPosition,
}

/// Payment deadlines of checkouts in `AwaitingPayment`.
///
/// A checkout enters when its order is created and leaves on any terminal
/// event, so the unpaid sweep only ever looks at open checkouts.
#[derive(Clone, Default)]
pub struct UnpaidCheckoutIndex {
    state: Arc<RwLock<UnpaidState>>,
}

impl UnpaidCheckoutIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open checkouts whose deadline is at or before `now`, earliest first.
    pub async fn due(&self, now: DateTime<Utc>) -> Vec<AggregateId> {
        let state = self.state.read().await;
        let mut due: Vec<_> = state
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, deadline)| (*deadline, *id))
            .collect();
        due.sort();
        due.into_iter().map(|(_, id)| id).collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.deadlines.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Projection for UnpaidCheckoutIndex {
    fn name(&self) -> &'static str {
        "UnpaidCheckoutIndex"
    }

    async fn handle(&self, event: &EventEnvelope) -> projections::Result<()> {
        let mut state = self.state.write().await;
        state.position = state.position.advance_to(event.position);

        if event.aggregate_type != CheckoutSaga::aggregate_type() {
            return Ok(());
        }

        let saga_id = event.aggregate_id;
        match event.decode::<CheckoutEvent>()? {
            CheckoutEvent::StepCompleted(data) if data.step == STEP_ORDER_CREATED => {
                if let Some(deadline) = data.payment_deadline {
                    state.deadlines.insert(saga_id, deadline);
                }
            }
            CheckoutEvent::PaymentLinked(_)
            | CheckoutEvent::CheckoutCompleted(_)
            | CheckoutEvent::CheckoutCompensated(_)
            | CheckoutEvent::CheckoutFailed(_) => {
                state.deadlines.remove(&saga_id);
            }
            _ => {}
        }
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> projections::Result<()> {
        *self.state.write().await = UnpaidState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use domain::DomainEvent;
    use event_store::Version;

    fn envelope(saga_id: AggregateId, version: i64, position: i64, event: &CheckoutEvent) -> EventEnvelope {
        let mut envelope = EventEnvelope::builder()
            .event_type(event.event_type())
            .aggregate_id(saga_id)
            .aggregate_type(CheckoutSaga::aggregate_type())
            .version(Version::new(version))
            .payload(event)
            .unwrap()
            .build()
            .unwrap();
        envelope.position = position;
        envelope
    }

    #[tokio::test]
    async fn tracks_open_checkouts_until_terminal() {
        let index = UnpaidCheckoutIndex::new();
        let now = Utc::now();
        let paid = AggregateId::new();
        let open = AggregateId::new();

        let created = CheckoutEvent::order_created(domain::Money::from_cents(100), now);
        index.handle(&envelope(paid, 3, 1, &created)).await.unwrap();
        index.handle(&envelope(open, 3, 2, &created)).await.unwrap();
        assert_eq!(index.len().await, 2);

        let linked = CheckoutEvent::payment_linked(AggregateId::new());
        index.handle(&envelope(paid, 4, 3, &linked)).await.unwrap();

        assert_eq!(index.due(now).await, vec![open]);
        assert!(index.due(now - Duration::seconds(1)).await.is_empty());
        assert_eq!(index.position().await.last_position, 3);
    }

    #[tokio::test]
    async fn ignores_other_streams_but_advances() {
        let index = UnpaidCheckoutIndex::new();
        let mut other = envelope(
            AggregateId::new(),
            1,
            7,
            &CheckoutEvent::checkout_failed("x"),
        );
        other.aggregate_type = "Order".to_string();
        index.handle(&other).await.unwrap();

        assert!(index.is_empty().await);
        assert_eq!(index.position().await.last_position, 7);
    }
}
