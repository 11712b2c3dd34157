//! Outbound collaborators of the checkout saga.

pub mod inventory;
pub mod order_ledger;
pub mod payments;
pub mod reservations;

pub use inventory::HttpInventoryOracle;
pub use order_ledger::{
    CancelOutcome, HttpOrderLedger, InMemoryOrderLedger, LocalOrderLedger, OrderLedger,
    OrderRequest, OrderRequestItem,
};
pub use payments::{InMemoryPaymentLookup, PaymentLookup, ProjectedPaymentLookup};
pub use reservations::{
    InMemoryStockReservations, Reservation, ReservationLine, StockReservations,
};
