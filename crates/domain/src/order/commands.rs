//! Order commands.

use common::{AggregateId, UserId};

use crate::command::Command;
use crate::value_objects::{Address, Money, ProductId};

use super::{Order, OrderStatus};

/// An item as requested by the caller, before validation.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
}

/// Command to place an order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    /// Doubles as an idempotency key when supplied by the caller.
    pub order_id: AggregateId,
    pub user_id: UserId,
    pub items: Vec<NewOrderItem>,
    pub shipping_address: Option<Address>,
}

impl PlaceOrder {
    pub fn new(user_id: UserId, items: Vec<NewOrderItem>) -> Self {
        Self {
            order_id: AggregateId::new(),
            user_id,
            items,
            shipping_address: None,
        }
    }

    pub fn with_id(mut self, order_id: AggregateId) -> Self {
        self.order_id = order_id;
        self
    }

    pub fn with_address(mut self, address: Option<Address>) -> Self {
        self.shipping_address = address;
        self
    }
}

impl Command for PlaceOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to change an order's status and/or shipping address.
#[derive(Debug, Clone)]
pub struct UpdateOrder {
    pub order_id: AggregateId,
    pub status: Option<OrderStatus>,
    pub shipping_address: Option<Address>,
}

impl UpdateOrder {
    pub fn status(order_id: AggregateId, status: OrderStatus) -> Self {
        Self {
            order_id,
            status: Some(status),
            shipping_address: None,
        }
    }
}

impl Command for UpdateOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to cancel a pending order.
#[derive(Debug, Clone)]
pub struct CancelOrder {
    pub order_id: AggregateId,
    pub reason: Option<String>,
}

impl CancelOrder {
    pub fn new(order_id: AggregateId, reason: Option<String>) -> Self {
        Self { order_id, reason }
    }
}

impl Command for CancelOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}
