//! Checkout step names, timing and the receipt handed back to the caller.

use std::time::Duration;

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{Money, OrderStatus, OrderView};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prices checked and stock reserved.
pub const STEP_VALIDATED: &str = "validated";

/// The Order Ledger accepted the order.
pub const STEP_ORDER_CREATED: &str = "order_created";

/// A payment was created for the order.
pub const STEP_PAYMENT_CREATED: &str = "payment_created";

pub const CANCEL_REASON_UNPAID: &str = "payment not received";

/// Timing knobs for a checkout.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutConfig {
    /// How long reserved stock is held.
    pub reservation_ttl: Duration,

    /// How long an order may wait for its payment before it is cancelled.
    pub payment_deadline: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            reservation_ttl: Duration::from_secs(900),
            payment_deadline: Duration::from_secs(1800),
        }
    }
}

/// What a successful checkout returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
    pub order_id: AggregateId,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&OrderView> for OrderReceipt {
    fn from(order: &OrderView) -> Self {
        Self {
            order_id: order.id,
            total_amount: order.total_amount,
            status: order.status,
            created_at: order.created_at,
        }
    }
}

const CHECKOUT_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_93b7_4d1a_8c55_0e2f_7b9d_3a61);

/// Stream id of the checkout that created `order_id`.
///
/// Derived from the order id so a payment can find its checkout without an
/// index.
pub fn checkout_id(order_id: AggregateId) -> AggregateId {
    AggregateId::from_uuid(Uuid::new_v5(&CHECKOUT_NAMESPACE, order_id.as_uuid().as_bytes()))
}

/// Converts a std duration for chrono arithmetic, saturating on overflow.
pub(crate) fn chrono_duration(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
