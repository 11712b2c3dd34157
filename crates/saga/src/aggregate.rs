//! Checkout saga aggregate.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use domain::{Address, Aggregate, Money};
use event_store::Version;
use serde::Serialize;

use crate::checkout::{STEP_ORDER_CREATED, STEP_PAYMENT_CREATED};
use crate::error::SagaError;
use crate::events::{CheckoutEvent, CheckoutLine, LockedLine, StepCompletedData};
use crate::state::CheckoutState;

/// An event-sourced checkout.
///
/// Records each step as it happens so a crash between steps leaves a
/// readable trail, and so the unpaid sweep can find orders to compensate.
#[derive(Debug, Clone, Default)]
pub struct CheckoutSaga {
    id: Option<AggregateId>,
    version: Version,
    order_id: Option<AggregateId>,
    user_id: Option<UserId>,
    state: CheckoutState,
    lines: Vec<CheckoutLine>,
    locked_lines: Vec<LockedLine>,
    shipping_address: Option<Address>,
    completed_steps: Vec<String>,
    reservation_id: Option<String>,
    total_amount: Option<Money>,
    payment_deadline: Option<DateTime<Utc>>,
    payment_id: Option<AggregateId>,
    failure_reason: Option<String>,
    note: Option<String>,
    started_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

/// Read shape of a checkout record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    pub id: AggregateId,
    pub order_id: AggregateId,
    pub user_id: UserId,
    pub state: CheckoutState,
    pub lines: Vec<CheckoutLine>,
    pub locked_lines: Vec<LockedLine>,
    pub completed_steps: Vec<String>,
    pub total_amount: Option<Money>,
    pub payment_deadline: Option<DateTime<Utc>>,
    pub payment_id: Option<AggregateId>,
    pub failure_reason: Option<String>,
    pub note: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for CheckoutSaga {
    type Event = CheckoutEvent;
    type Error = SagaError;

    fn aggregate_type() -> &'static str {
        "CheckoutSaga"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            CheckoutEvent::CheckoutStarted(data) => {
                self.id = Some(data.saga_id);
                self.order_id = Some(data.order_id);
                self.user_id = Some(data.user_id);
                self.lines = data.lines;
                self.shipping_address = data.shipping_address;
                self.state = CheckoutState::Validating;
                self.started_at = Some(data.started_at);
                self.updated_at = Some(data.started_at);
            }
            CheckoutEvent::StepCompleted(data) => self.apply_step_completed(data),
            CheckoutEvent::StepFailed(data) => {
                self.failure_reason = Some(data.error);
                self.updated_at = Some(data.failed_at);
            }
            CheckoutEvent::CheckoutFailed(data) => {
                self.state = CheckoutState::Failed;
                self.failure_reason = Some(data.reason);
                self.updated_at = Some(data.failed_at);
            }
            CheckoutEvent::PaymentLinked(data) => {
                self.completed_steps.push(STEP_PAYMENT_CREATED.to_string());
                self.payment_id = Some(data.payment_id);
                self.state = CheckoutState::Completed;
                self.updated_at = Some(data.linked_at);
            }
            CheckoutEvent::CheckoutCompleted(data) => {
                self.state = CheckoutState::Completed;
                self.note = Some(data.note);
                self.updated_at = Some(data.completed_at);
            }
            CheckoutEvent::CheckoutCompensated(data) => {
                self.state = CheckoutState::Compensated;
                self.note = Some(data.reason);
                self.updated_at = Some(data.compensated_at);
            }
        }
    }
}

// Query methods
impl CheckoutSaga {
    pub fn state(&self) -> CheckoutState {
        self.state
    }

    pub fn order_id(&self) -> Option<AggregateId> {
        self.order_id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn lines(&self) -> &[CheckoutLine] {
        &self.lines
    }

    pub fn locked_lines(&self) -> &[LockedLine] {
        &self.locked_lines
    }

    pub fn shipping_address(&self) -> Option<&Address> {
        self.shipping_address.as_ref()
    }

    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }

    pub fn reservation_id(&self) -> Option<&str> {
        self.reservation_id.as_deref()
    }

    pub fn payment_deadline(&self) -> Option<DateTime<Utc>> {
        self.payment_deadline
    }

    pub fn payment_id(&self) -> Option<AggregateId> {
        self.payment_id
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Still waiting for a payment after its deadline passed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.state.awaits_payment() && self.payment_deadline.is_some_and(|d| d <= now)
    }

    pub fn to_view(&self) -> Option<CheckoutView> {
        Some(CheckoutView {
            id: self.id?,
            order_id: self.order_id?,
            user_id: self.user_id?,
            state: self.state,
            lines: self.lines.clone(),
            locked_lines: self.locked_lines.clone(),
            completed_steps: self.completed_steps.clone(),
            total_amount: self.total_amount,
            payment_deadline: self.payment_deadline,
            payment_id: self.payment_id,
            failure_reason: self.failure_reason.clone(),
            note: self.note.clone(),
            started_at: self.started_at,
            updated_at: self.updated_at,
        })
    }
}

// Command methods
impl CheckoutSaga {
    pub fn start(
        &self,
        saga_id: AggregateId,
        order_id: AggregateId,
        user_id: UserId,
        lines: Vec<CheckoutLine>,
        shipping_address: Option<Address>,
    ) -> Result<Vec<CheckoutEvent>, SagaError> {
        if !self.state.can_start() {
            return Err(SagaError::AlreadyStarted);
        }
        if lines.is_empty() {
            return Err(SagaError::NoItemsSelected);
        }
        Ok(vec![CheckoutEvent::checkout_started(
            saga_id,
            order_id,
            user_id,
            lines,
            shipping_address,
        )])
    }

    /// Links a payment. Anything but `AwaitingPayment` is left alone, which
    /// makes repeated links harmless.
    pub fn link_payment(&self, payment_id: AggregateId) -> Vec<CheckoutEvent> {
        if self.state.awaits_payment() {
            vec![CheckoutEvent::payment_linked(payment_id)]
        } else {
            Vec::new()
        }
    }
}

impl CheckoutSaga {
    fn apply_step_completed(&mut self, data: StepCompletedData) {
        if data.step == STEP_ORDER_CREATED {
            self.state = CheckoutState::AwaitingPayment;
        }
        if let Some(reservation_id) = data.reservation_id {
            self.reservation_id = Some(reservation_id);
        }
        if !data.locked_lines.is_empty() {
            self.locked_lines = data.locked_lines;
        }
        if let Some(total) = data.total_amount {
            self.total_amount = Some(total);
        }
        if let Some(deadline) = data.payment_deadline {
            self.payment_deadline = Some(deadline);
        }
        self.completed_steps.push(data.step);
        self.updated_at = Some(data.completed_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn started() -> CheckoutSaga {
        let mut saga = CheckoutSaga::default();
        let events = saga
            .start(
                AggregateId::new(),
                AggregateId::new(),
                UserId::new(),
                vec![CheckoutLine {
                    product_id: "p1".into(),
                    name: "Mug".into(),
                    quantity: 2,
                }],
                None,
            )
            .unwrap();
        saga.apply_events(events);
        saga
    }

    fn awaiting(deadline: DateTime<Utc>) -> CheckoutSaga {
        let mut saga = started();
        saga.apply(CheckoutEvent::validated("RSV-1".into(), vec![]));
        saga.apply(CheckoutEvent::order_created(Money::from_cents(2000), deadline));
        saga
    }

    #[test]
    fn start_moves_to_validating() {
        let saga = started();
        assert_eq!(saga.state(), CheckoutState::Validating);
        assert_eq!(saga.lines().len(), 1);
    }

    #[test]
    fn start_twice_is_rejected() {
        let saga = started();
        let result = saga.start(AggregateId::new(), AggregateId::new(), UserId::new(), vec![], None);
        assert!(matches!(result, Err(SagaError::AlreadyStarted)));
    }

    #[test]
    fn start_without_lines_is_rejected() {
        let result = CheckoutSaga::default().start(
            AggregateId::new(),
            AggregateId::new(),
            UserId::new(),
            vec![],
            None,
        );
        assert!(matches!(result, Err(SagaError::NoItemsSelected)));
    }

    #[test]
    fn order_created_waits_for_payment() {
        let saga = awaiting(Utc::now() + Duration::minutes(30));
        assert_eq!(saga.state(), CheckoutState::AwaitingPayment);
        assert_eq!(saga.reservation_id(), Some("RSV-1"));
        assert_eq!(
            saga.completed_steps(),
            &["validated".to_string(), "order_created".to_string()]
        );
    }

    #[test]
    fn overdue_only_after_deadline() {
        let now = Utc::now();
        let saga = awaiting(now + Duration::minutes(30));
        assert!(!saga.is_overdue(now));
        assert!(saga.is_overdue(now + Duration::minutes(31)));
    }

    #[test]
    fn link_payment_completes_once() {
        let mut saga = awaiting(Utc::now());
        let payment = AggregateId::new();
        let events = saga.link_payment(payment);
        assert_eq!(events.len(), 1);
        saga.apply_events(events);

        assert_eq!(saga.state(), CheckoutState::Completed);
        assert_eq!(saga.payment_id(), Some(payment));
        assert!(saga.link_payment(AggregateId::new()).is_empty());
    }

    #[test]
    fn failure_is_terminal() {
        let mut saga = started();
        saga.apply(CheckoutEvent::step_failed("validated", "insufficient stock"));
        saga.apply(CheckoutEvent::checkout_failed("insufficient stock"));
        assert_eq!(saga.state(), CheckoutState::Failed);
        assert!(saga.link_payment(AggregateId::new()).is_empty());
        assert_eq!(saga.failure_reason(), Some("insufficient stock"));
    }

    #[test]
    fn compensated_view() {
        let mut saga = awaiting(Utc::now());
        saga.apply(CheckoutEvent::checkout_compensated("payment not received"));
        let view = saga.to_view().unwrap();
        assert_eq!(view.state, CheckoutState::Compensated);
        assert_eq!(view.note.as_deref(), Some("payment not received"));
    }
}
