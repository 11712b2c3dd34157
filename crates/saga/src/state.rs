//! Checkout saga state machine.

use serde::{Deserialize, Serialize};

/// The state of a checkout in its lifecycle.
///
/// ```text
/// NotStarted ──► Validating ──┬──► AwaitingPayment ──┬──► Completed
///                             │                      └──► Compensated
///                             └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CheckoutState {
    #[default]
    NotStarted,

    /// Stock is being checked and reserved, then the order is created.
    Validating,

    /// The order exists; a payment has to be created before the deadline.
    AwaitingPayment,

    Completed,

    /// Checkout stopped before an order was created (terminal state).
    Failed,

    /// The unpaid order was cancelled (terminal state).
    Compensated,
}

impl CheckoutState {
    pub fn can_start(&self) -> bool {
        matches!(self, CheckoutState::NotStarted)
    }

    pub fn awaits_payment(&self) -> bool {
        matches!(self, CheckoutState::AwaitingPayment)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckoutState::Completed | CheckoutState::Failed | CheckoutState::Compensated
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::NotStarted => "NotStarted",
            CheckoutState::Validating => "Validating",
            CheckoutState::AwaitingPayment => "AwaitingPayment",
            CheckoutState::Completed => "Completed",
            CheckoutState::Failed => "Failed",
            CheckoutState::Compensated => "Compensated",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
