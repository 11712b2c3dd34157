//! Checkout saga events.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use domain::{Address, DomainEvent, Money, ProductId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CheckoutEvent {
    CheckoutStarted(CheckoutStartedData),

    StepCompleted(StepCompletedData),

    StepFailed(StepFailedData),

    /// Checkout ended before an order existed.
    CheckoutFailed(CheckoutFailedData),

    /// A payment was created for the order.
    PaymentLinked(PaymentLinkedData),

    /// Closed without a payment link, e.g. the order had already moved on
    /// when the unpaid sweep reached it.
    CheckoutCompleted(CheckoutCompletedData),

    /// The unpaid order was cancelled.
    CheckoutCompensated(CheckoutCompensatedData),
}

impl DomainEvent for CheckoutEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CheckoutEvent::CheckoutStarted(_) => "CheckoutStarted",
            CheckoutEvent::StepCompleted(_) => "StepCompleted",
            CheckoutEvent::StepFailed(_) => "StepFailed",
            CheckoutEvent::CheckoutFailed(_) => "CheckoutFailed",
            CheckoutEvent::PaymentLinked(_) => "PaymentLinked",
            CheckoutEvent::CheckoutCompleted(_) => "CheckoutCompleted",
            CheckoutEvent::CheckoutCompensated(_) => "CheckoutCompensated",
        }
    }
}

/// A selected cart line as it was when checkout began.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLine {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
}

/// A line priced from the catalog during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedLine {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutStartedData {
    pub saga_id: AggregateId,
    /// Assigned before the ledger is called so a retry cannot create a
    /// second order.
    pub order_id: AggregateId,
    pub user_id: UserId,
    pub lines: Vec<CheckoutLine>,
    pub shipping_address: Option<Address>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepCompletedData {
    pub step: String,
    #[serde(default)]
    pub reservation_id: Option<String>,
    #[serde(default)]
    pub locked_lines: Vec<LockedLine>,
    #[serde(default)]
    pub total_amount: Option<Money>,
    #[serde(default)]
    pub payment_deadline: Option<DateTime<Utc>>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFailedData {
    pub step: String,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutFailedData {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLinkedData {
    pub payment_id: AggregateId,
    pub linked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutCompletedData {
    pub note: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutCompensatedData {
    pub reason: String,
    pub compensated_at: DateTime<Utc>,
}

impl CheckoutEvent {
    pub fn checkout_started(
        saga_id: AggregateId,
        order_id: AggregateId,
        user_id: UserId,
        lines: Vec<CheckoutLine>,
        shipping_address: Option<Address>,
    ) -> Self {
        CheckoutEvent::CheckoutStarted(CheckoutStartedData {
            saga_id,
            order_id,
            user_id,
            lines,
            shipping_address,
            started_at: Utc::now(),
        })
    }

    pub fn validated(reservation_id: String, locked_lines: Vec<LockedLine>) -> Self {
        CheckoutEvent::StepCompleted(StepCompletedData {
            step: crate::checkout::STEP_VALIDATED.to_string(),
            reservation_id: Some(reservation_id),
            locked_lines,
            total_amount: None,
            payment_deadline: None,
            completed_at: Utc::now(),
        })
    }

    pub fn order_created(total_amount: Money, payment_deadline: DateTime<Utc>) -> Self {
        CheckoutEvent::StepCompleted(StepCompletedData {
            step: crate::checkout::STEP_ORDER_CREATED.to_string(),
            reservation_id: None,
            locked_lines: Vec::new(),
            total_amount: Some(total_amount),
            payment_deadline: Some(payment_deadline),
            completed_at: Utc::now(),
        })
    }

    pub fn step_failed(step: impl Into<String>, error: impl Into<String>) -> Self {
        CheckoutEvent::StepFailed(StepFailedData {
            step: step.into(),
            error: error.into(),
            failed_at: Utc::now(),
        })
    }

    pub fn checkout_failed(reason: impl Into<String>) -> Self {
        CheckoutEvent::CheckoutFailed(CheckoutFailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }

    pub fn payment_linked(payment_id: AggregateId) -> Self {
        CheckoutEvent::PaymentLinked(PaymentLinkedData {
            payment_id,
            linked_at: Utc::now(),
        })
    }

    pub fn checkout_completed(note: impl Into<String>) -> Self {
        CheckoutEvent::CheckoutCompleted(CheckoutCompletedData {
            note: note.into(),
            completed_at: Utc::now(),
        })
    }

    pub fn checkout_compensated(reason: impl Into<String>) -> Self {
        CheckoutEvent::CheckoutCompensated(CheckoutCompensatedData {
            reason: reason.into(),
            compensated_at: Utc::now(),
        })
    }
}
