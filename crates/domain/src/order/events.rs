//! Order domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{Address, Money};

use super::{OrderError, OrderItem, OrderStatus};

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was placed with its final item list.
    OrderPlaced(OrderPlacedData),

    /// Order moved along the status table (not used for cancellation).
    OrderStatusChanged(OrderStatusChangedData),

    OrderAddressChanged(OrderAddressChangedData),

    OrderCancelled(OrderCancelledData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::OrderStatusChanged(_) => "OrderStatusChanged",
            OrderEvent::OrderAddressChanged(_) => "OrderAddressChanged",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
        }
    }
}

/// Data for OrderPlaced event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: AggregateId,
    pub user_id: UserId,

    /// Items with prices copied at placement time.
    pub items: Vec<OrderItem>,

    /// Sum of the item line totals.
    pub total_amount: Money,

    pub shipping_address: Option<Address>,
    pub placed_at: DateTime<Utc>,
}

/// Data for OrderStatusChanged event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusChangedData {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub changed_at: DateTime<Utc>,
}

/// Data for OrderAddressChanged event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAddressChangedData {
    pub shipping_address: Address,
    pub changed_at: DateTime<Utc>,
}

/// Data for OrderCancelled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub reason: Option<String>,
    pub cancelled_at: DateTime<Utc>,
}

impl OrderEvent {
    /// Computes the total server-side. Fails with `AmountOverflow` when a
    /// line or the sum does not fit.
    pub fn order_placed(
        order_id: AggregateId,
        user_id: UserId,
        items: Vec<OrderItem>,
        shipping_address: Option<Address>,
    ) -> Result<Self, OrderError> {
        let total_amount = items
            .iter()
            .map(OrderItem::total_price)
            .collect::<Option<Vec<_>>>()
            .and_then(Money::checked_sum)
            .ok_or(OrderError::AmountOverflow)?;
        Ok(OrderEvent::OrderPlaced(OrderPlacedData {
            order_id,
            user_id,
            items,
            total_amount,
            shipping_address,
            placed_at: Utc::now(),
        }))
    }

    pub fn status_changed(from: OrderStatus, to: OrderStatus) -> Self {
        OrderEvent::OrderStatusChanged(OrderStatusChangedData {
            from,
            to,
            changed_at: Utc::now(),
        })
    }

    pub fn address_changed(shipping_address: Address) -> Self {
        OrderEvent::OrderAddressChanged(OrderAddressChangedData {
            shipping_address,
            changed_at: Utc::now(),
        })
    }

    pub fn order_cancelled(reason: Option<String>) -> Self {
        OrderEvent::OrderCancelled(OrderCancelledData {
            reason,
            cancelled_at: Utc::now(),
        })
    }
}
