//! Domain layer for cart checkout and order fulfillment.
//!
//! This crate provides:
//! - The `Aggregate`/`DomainEvent` traits and the `CommandHandler` that
//!   persists what commands decide
//! - The per-user cart (Cart Store)
//! - Orders and their status machine (Order Ledger)
//! - Payments with a cumulative refund ledger (Payment Processor)
//! - The catalog lookup seam carts and checkouts price against

pub mod aggregate;
pub mod cart;
pub mod catalog;
pub mod command;
pub mod error;
pub mod order;
pub mod payment;
pub mod value_objects;

pub use aggregate::{Aggregate, DomainEvent};
pub use cart::{Cart, CartError, CartEvent, CartLine, CartService, CartSummary, cart_id};
pub use catalog::{CatalogError, InMemoryCatalog, InventoryOracle, ProductSnapshot};
pub use command::{Command, CommandHandler, CommandResult};
pub use error::DomainError;
pub use order::{
    CancelOrder, NewOrderItem, Order, OrderError, OrderEvent, OrderItem, OrderService,
    OrderStatus, OrderView, PlaceOrder, UpdateOrder,
};
pub use payment::{
    CreatePayment, Payment, PaymentError, PaymentEvent, PaymentMethod, PaymentService,
    PaymentStatus, PaymentView, Refund, RefundPayment, SettlementGateway, SettlementOutcome,
    SettlementRequest, SimulatedGateway,
};
pub use value_objects::{Address, Money, ProductId};
