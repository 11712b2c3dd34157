//! Query-side views.

pub mod order_summaries;
pub mod payment_ledger;

pub use order_summaries::{OrderPage, OrderSummaryView};
pub use payment_ledger::{PaymentLedgerView, PaymentPage};
