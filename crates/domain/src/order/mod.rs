//! Order aggregate and the Order Ledger service.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;

pub use aggregate::{Order, OrderItem, OrderView};
pub use commands::{CancelOrder, NewOrderItem, PlaceOrder, UpdateOrder};
pub use events::{
    OrderAddressChangedData, OrderCancelledData, OrderEvent, OrderPlacedData,
    OrderStatusChangedData,
};
pub use service::OrderService;
pub use state::{OrderStatus, ParseStatusError};

use common::AggregateId;
use thiserror::Error;

use crate::value_objects::ProductId;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order has no items")]
    NoItems,

    #[error("invalid quantity for {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    #[error("invalid price for {product_id}: {price} (must not be negative)")]
    InvalidPrice { product_id: ProductId, price: i64 },

    /// The operation is not allowed from the order's current status.
    #[error("invalid order state: cannot {action} while order is {current}")]
    InvalidOrderState {
        current: OrderStatus,
        action: String,
    },

    #[error("order already exists: {order_id}")]
    AlreadyExists { order_id: AggregateId },

    #[error("order total exceeds the largest supported amount")]
    AmountOverflow,

    #[error("update must change the status or the shipping address")]
    NothingToUpdate,
}
