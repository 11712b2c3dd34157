//! Payment aggregate, refund ledger and the Payment Processor service.

mod aggregate;
mod commands;
mod events;
mod gateway;
mod service;
mod state;

pub use aggregate::{Payment, PaymentView, Refund};
pub use commands::{CreatePayment, RefundPayment};
pub use events::{
    PaymentCancelledData, PaymentCreatedData, PaymentEvent, PaymentFailedData,
    PaymentRefundedData, PaymentSucceededData, RefundRecordedData,
};
pub use gateway::{SettlementGateway, SettlementOutcome, SettlementRequest, SimulatedGateway};
pub use service::PaymentService;
pub use state::{PaymentMethod, PaymentStatus};

use common::AggregateId;
use thiserror::Error;

use crate::value_objects::Money;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("invalid amount: {amount} (must be greater than 0)")]
    InvalidAmount { amount: i64 },

    #[error("invalid currency: {currency:?} (expected a 3-letter code)")]
    InvalidCurrency { currency: String },

    #[error("invalid payment status: cannot {action} while payment is {current}")]
    InvalidPaymentStatus {
        current: PaymentStatus,
        action: &'static str,
    },

    /// Refunds are measured against what has not been refunded yet.
    #[error("invalid refund amount: requested {requested}, refundable {remaining}")]
    InvalidRefundAmount { requested: Money, remaining: Money },

    #[error("payment already exists: {payment_id}")]
    AlreadyExists { payment_id: AggregateId },
}
