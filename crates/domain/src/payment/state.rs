//! Payment status machine and payment methods.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a payment.
///
/// ```text
/// pending ──► success ──► refunded
///    ├──────► failed
///    └──────► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Success,
    Failed,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    pub fn can_process(&self) -> bool {
        matches!(self, PaymentStatus::Pending)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, PaymentStatus::Pending)
    }

    pub fn can_refund(&self) -> bool {
        matches!(self, PaymentStatus::Success)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Failed | PaymentStatus::Refunded | PaymentStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    BankTransfer,
    DigitalWallet,
}
