//! Payment commands.

use common::{AggregateId, UserId};

use crate::command::Command;
use crate::value_objects::Money;

use super::{Payment, PaymentMethod};

#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub payment_id: AggregateId,
    pub order_id: AggregateId,
    pub user_id: UserId,
    pub amount: Money,
    pub currency: String,
    pub method: PaymentMethod,
}

impl CreatePayment {
    pub fn new(
        order_id: AggregateId,
        user_id: UserId,
        amount: Money,
        currency: impl Into<String>,
        method: PaymentMethod,
    ) -> Self {
        Self {
            payment_id: AggregateId::new(),
            order_id,
            user_id,
            amount,
            currency: currency.into(),
            method,
        }
    }
}

impl Command for CreatePayment {
    type Aggregate = Payment;

    fn aggregate_id(&self) -> AggregateId {
        self.payment_id
    }
}

#[derive(Debug, Clone)]
pub struct RefundPayment {
    pub payment_id: AggregateId,
    pub amount: Money,
    pub reason: String,
}

impl RefundPayment {
    pub fn new(payment_id: AggregateId, amount: Money, reason: impl Into<String>) -> Self {
        Self {
            payment_id,
            amount,
            reason: reason.into(),
        }
    }
}

impl Command for RefundPayment {
    type Aggregate = Payment;

    fn aggregate_id(&self) -> AggregateId {
        self.payment_id
    }
}
