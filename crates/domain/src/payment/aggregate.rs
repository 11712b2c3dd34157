//! Payment aggregate and its refund ledger.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::value_objects::Money;

use super::events::{PaymentCreatedData, RefundRecordedData};
use super::gateway::{SettlementOutcome, SettlementRequest};
use super::{PaymentError, PaymentEvent, PaymentMethod, PaymentStatus};

/// A recorded refund. Never changes after it is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    pub id: Uuid,
    pub payment_id: AggregateId,
    pub amount: Money,
    pub reason: String,
    /// Refunds are simulated and always succeed.
    pub status: String,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
}

/// Read shape of a payment, refund history included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub id: AggregateId,
    pub order_id: AggregateId,
    pub user_id: UserId,
    pub amount: Money,
    pub currency: String,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub error_message: Option<String>,
    pub refunded_amount: Money,
    pub refunds: Vec<Refund>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct Payment {
    id: Option<AggregateId>,
    version: Version,
    order_id: Option<AggregateId>,
    user_id: Option<UserId>,
    amount: Money,
    currency: String,
    method: Option<PaymentMethod>,
    status: PaymentStatus,
    transaction_id: Option<String>,
    error_message: Option<String>,
    refunded_amount: Money,
    refunds: Vec<Refund>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Aggregate for Payment {
    type Event = PaymentEvent;
    type Error = PaymentError;

    fn aggregate_type() -> &'static str {
        "Payment"
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
            PaymentEvent::PaymentCreated(data) => self.apply_created(data),
            PaymentEvent::PaymentSucceeded(data) => {
                self.status = PaymentStatus::Success;
                self.transaction_id = Some(data.transaction_id);
                self.updated_at = data.processed_at;
            }
            PaymentEvent::PaymentFailed(data) => {
                self.status = PaymentStatus::Failed;
                self.error_message = Some(data.error_message);
                self.updated_at = data.processed_at;
            }
            PaymentEvent::RefundRecorded(data) => self.apply_refund(data),
            PaymentEvent::PaymentRefunded(data) => {
                self.status = PaymentStatus::Refunded;
                self.updated_at = data.refunded_at;
            }
            PaymentEvent::PaymentCancelled(data) => {
                self.status = PaymentStatus::Cancelled;
                self.updated_at = data.cancelled_at;
            }
        }
    }
}

impl Payment {
    pub fn order_id(&self) -> Option<AggregateId> {
        self.order_id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn refunded_amount(&self) -> Money {
        self.refunded_amount
    }

    /// What can still be refunded.
    pub fn refundable(&self) -> Money {
        self.amount.saturating_sub(self.refunded_amount)
    }

    pub fn refunds(&self) -> &[Refund] {
        &self.refunds
    }

    /// What the gateway needs to settle this payment.
    pub fn settlement_request(&self) -> Option<SettlementRequest> {
        Some(SettlementRequest {
            payment_id: self.id?.to_string(),
            amount: self.amount,
            currency: self.currency.clone(),
        })
    }

    pub fn to_view(&self) -> Option<PaymentView> {
        Some(PaymentView {
            id: self.id?,
            order_id: self.order_id?,
            user_id: self.user_id?,
            amount: self.amount,
            currency: self.currency.clone(),
            status: self.status,
            method: self.method?,
            transaction_id: self.transaction_id.clone(),
            error_message: self.error_message.clone(),
            refunded_amount: self.refunded_amount,
            refunds: self.refunds.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// Commands
impl Payment {
    pub fn create(
        &self,
        payment_id: AggregateId,
        order_id: AggregateId,
        user_id: UserId,
        amount: Money,
        currency: &str,
        method: PaymentMethod,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        if self.id.is_some() {
            return Err(PaymentError::AlreadyExists { payment_id });
        }
        if !amount.is_positive() {
            return Err(PaymentError::InvalidAmount {
                amount: amount.cents(),
            });
        }
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(PaymentError::InvalidCurrency {
                currency: currency.to_string(),
            });
        }

        Ok(vec![PaymentEvent::payment_created(
            payment_id,
            order_id,
            user_id,
            amount,
            currency.to_ascii_uppercase(),
            method,
        )])
    }

    /// Records the gateway's answer. The status check happens before the
    /// gateway is called; this repeats it against the freshly loaded state.
    pub fn record_settlement(
        &self,
        outcome: SettlementOutcome,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        self.ensure(self.status.can_process(), "process")?;

        Ok(vec![match outcome {
            SettlementOutcome::Approved { transaction_id } => {
                PaymentEvent::payment_succeeded(transaction_id)
            }
            SettlementOutcome::Declined { error_message } => {
                PaymentEvent::payment_failed(error_message)
            }
        }])
    }

    pub fn ensure_processable(&self) -> Result<(), PaymentError> {
        self.ensure(self.status.can_process(), "process")
    }

    /// Refunds are checked against what is left, not the original amount,
    /// so partial refunds can never add up to more than was charged.
    pub fn refund(&self, amount: Money, reason: String) -> Result<Vec<PaymentEvent>, PaymentError> {
        self.ensure(self.status.can_refund(), "refund")?;

        let remaining = self.refundable();
        if !amount.is_positive() || amount > remaining {
            return Err(PaymentError::InvalidRefundAmount {
                requested: amount,
                remaining,
            });
        }

        let mut events = vec![PaymentEvent::refund_recorded(amount, reason)];
        if amount == remaining {
            events.push(PaymentEvent::payment_refunded());
        }
        Ok(events)
    }

    pub fn cancel(&self) -> Result<Vec<PaymentEvent>, PaymentError> {
        self.ensure(self.status.can_cancel(), "cancel")?;
        Ok(vec![PaymentEvent::payment_cancelled()])
    }

    fn ensure(&self, allowed: bool, action: &'static str) -> Result<(), PaymentError> {
        if allowed {
            Ok(())
        } else {
            Err(PaymentError::InvalidPaymentStatus {
                current: self.status,
                action,
            })
        }
    }
}

impl Payment {
    fn apply_created(&mut self, data: PaymentCreatedData) {
        self.id = Some(data.payment_id);
        self.order_id = Some(data.order_id);
        self.user_id = Some(data.user_id);
        self.amount = data.amount;
        self.currency = data.currency;
        self.method = Some(data.method);
        self.status = PaymentStatus::Pending;
        self.created_at = data.created_at;
        self.updated_at = data.created_at;
    }

    fn apply_refund(&mut self, data: RefundRecordedData) {
        self.refunded_amount = self.refunded_amount.saturating_add(data.amount);
        self.updated_at = data.recorded_at;
        if let Some(payment_id) = self.id {
            self.refunds.push(Refund {
                id: data.refund_id,
                payment_id,
                amount: data.amount,
                reason: data.reason,
                status: "success".to_string(),
                transaction_id: data.transaction_id,
                created_at: data.recorded_at,
            });
        }
    }
}
