//! Cart checkout as a durable saga.
//!
//! A checkout runs three steps, each recorded on a `CheckoutSaga` stream:
//! 1. Validate: price every selected line from the catalog and reserve stock
//! 2. Create the order through the Order Ledger, exactly once
//! 3. Remove the purchased lines from the cart (best-effort)
//!
//! The saga then waits for a payment. If none is created before the deadline
//! the order is cancelled as compensation.

pub mod aggregate;
pub mod checkout;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod services;
pub mod state;
pub mod unpaid;

pub use aggregate::{CheckoutSaga, CheckoutView};
pub use checkout::{CheckoutConfig, OrderReceipt, checkout_id};
pub use coordinator::{CheckoutCoordinator, SweepReport};
pub use error::{Result, SagaError};
pub use events::{CheckoutEvent, CheckoutLine, LockedLine};
pub use services::{
    CancelOutcome, HttpInventoryOracle, HttpOrderLedger, InMemoryOrderLedger,
    InMemoryPaymentLookup, InMemoryStockReservations, LocalOrderLedger, OrderLedger,
    OrderRequest, OrderRequestItem, PaymentLookup, ProjectedPaymentLookup, StockReservations,
};
pub use state::CheckoutState;
pub use unpaid::UnpaidCheckoutIndex;
