//! Payment domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::DomainEvent;
use crate::value_objects::Money;

use super::PaymentMethod;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PaymentEvent {
    PaymentCreated(PaymentCreatedData),

    /// The gateway approved the charge.
    PaymentSucceeded(PaymentSucceededData),

    /// The gateway declined the charge.
    PaymentFailed(PaymentFailedData),

    /// A (possibly partial) refund was recorded.
    RefundRecorded(RefundRecordedData),

    /// Refunds reached the full payment amount.
    PaymentRefunded(PaymentRefundedData),

    PaymentCancelled(PaymentCancelledData),
}

impl DomainEvent for PaymentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentEvent::PaymentCreated(_) => "PaymentCreated",
            PaymentEvent::PaymentSucceeded(_) => "PaymentSucceeded",
            PaymentEvent::PaymentFailed(_) => "PaymentFailed",
            PaymentEvent::RefundRecorded(_) => "RefundRecorded",
            PaymentEvent::PaymentRefunded(_) => "PaymentRefunded",
            PaymentEvent::PaymentCancelled(_) => "PaymentCancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCreatedData {
    pub payment_id: AggregateId,
    pub order_id: AggregateId,
    pub user_id: UserId,
    pub amount: Money,
    pub currency: String,
    pub method: PaymentMethod,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSucceededData {
    pub transaction_id: String,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFailedData {
    pub error_message: String,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRecordedData {
    pub refund_id: Uuid,
    pub amount: Money,
    pub reason: String,
    pub transaction_id: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRefundedData {
    pub refunded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCancelledData {
    pub cancelled_at: DateTime<Utc>,
}

impl PaymentEvent {
    pub fn payment_created(
        payment_id: AggregateId,
        order_id: AggregateId,
        user_id: UserId,
        amount: Money,
        currency: String,
        method: PaymentMethod,
    ) -> Self {
        PaymentEvent::PaymentCreated(PaymentCreatedData {
            payment_id,
            order_id,
            user_id,
            amount,
            currency,
            method,
            created_at: Utc::now(),
        })
    }

    pub fn payment_succeeded(transaction_id: String) -> Self {
        PaymentEvent::PaymentSucceeded(PaymentSucceededData {
            transaction_id,
            processed_at: Utc::now(),
        })
    }

    pub fn payment_failed(error_message: String) -> Self {
        PaymentEvent::PaymentFailed(PaymentFailedData {
            error_message,
            processed_at: Utc::now(),
        })
    }

    pub fn refund_recorded(amount: Money, reason: String) -> Self {
        PaymentEvent::RefundRecorded(RefundRecordedData {
            refund_id: Uuid::new_v4(),
            amount,
            reason,
            transaction_id: format!("RFD-{}", Uuid::new_v4()),
            recorded_at: Utc::now(),
        })
    }

    pub fn payment_refunded() -> Self {
        PaymentEvent::PaymentRefunded(PaymentRefundedData {
            refunded_at: Utc::now(),
        })
    }

    pub fn payment_cancelled() -> Self {
        PaymentEvent::PaymentCancelled(PaymentCancelledData {
            cancelled_at: Utc::now(),
        })
    }
}
