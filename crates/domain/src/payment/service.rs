//! Payment Processor service.

use std::sync::Arc;

use common::AggregateId;
use event_store::EventStore;

use crate::command::{Command, CommandHandler};
use crate::error::DomainError;

use super::{
    CreatePayment, Payment, PaymentEvent, RefundPayment, SettlementGateway, SettlementOutcome,
};

pub struct PaymentService<S: EventStore> {
    handler: CommandHandler<S, Payment>,
    gateway: Arc<dyn SettlementGateway>,
}

impl<S: EventStore> PaymentService<S> {
    pub fn new(store: S, gateway: Arc<dyn SettlementGateway>) -> Self {
        Self {
            handler: CommandHandler::new(store),
            gateway,
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Payment> {
        &self.handler
    }

    /// Records a pending payment. The referenced order is not checked.
    #[tracing::instrument(skip(self, cmd), fields(payment_id = %cmd.payment_id, order_id = %cmd.order_id))]
    pub async fn create_payment(&self, cmd: CreatePayment) -> Result<Payment, DomainError> {
        let payment_id = cmd.aggregate_id();
        let CreatePayment {
            order_id,
            user_id,
            amount,
            currency,
            method,
            ..
        } = cmd;

        let result = self
            .handler
            .execute(payment_id, |payment| {
                payment.create(payment_id, order_id, user_id, amount, &currency, method)
            })
            .await?;

        metrics::counter!("payments_created_total").increment(1);
        tracing::info!(%amount, "payment created");
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_payment(
        &self,
        payment_id: AggregateId,
    ) -> Result<Option<Payment>, DomainError> {
        self.handler.load_existing(payment_id).await
    }

    /// Settles a pending payment through the gateway.
    ///
    /// The gateway is called once. Its answer is committed against the
    /// version that was loaded, so a payment cancelled meanwhile surfaces as
    /// a conflict instead of being overwritten.
    #[tracing::instrument(skip(self))]
    pub async fn process_payment(&self, payment_id: AggregateId) -> Result<Payment, DomainError> {
        let payment = self
            .handler
            .load_existing(payment_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Payment", payment_id))?;
        payment.ensure_processable()?;

        let request = payment
            .settlement_request()
            .ok_or_else(|| DomainError::not_found("Payment", payment_id))?;
        let outcome = self.gateway.settle(&request).await;

        let label = match &outcome {
            SettlementOutcome::Approved { .. } => "approved",
            SettlementOutcome::Declined { .. } => "declined",
        };

        let result = self
            .handler
            .execute_loaded(payment_id, payment, |p| p.record_settlement(outcome))
            .await?;

        metrics::counter!("payments_processed_total", "outcome" => label).increment(1);
        tracing::info!(outcome = label, status = %result.aggregate.status(), "payment processed");
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self, cmd), fields(payment_id = %cmd.payment_id, amount = %cmd.amount))]
    pub async fn refund_payment(&self, cmd: RefundPayment) -> Result<Payment, DomainError> {
        let RefundPayment {
            payment_id,
            amount,
            reason,
        } = cmd;

        let result = self
            .handler
            .execute_existing(payment_id, |payment| payment.refund(amount, reason))
            .await?;

        metrics::counter!("refunds_recorded_total").increment(1);
        let fully_refunded = result
            .events
            .iter()
            .any(|e| matches!(e, PaymentEvent::PaymentRefunded(_)));
        tracing::info!(
            refunded = %result.aggregate.refunded_amount(),
            fully_refunded,
            "refund recorded"
        );
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel_payment(&self, payment_id: AggregateId) -> Result<Payment, DomainError> {
        let result = self
            .handler
            .execute_existing(payment_id, |payment| payment.cancel())
            .await?;
        tracing::info!("payment cancelled");
        Ok(result.aggregate)
    }
}
