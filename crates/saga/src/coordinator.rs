//! Checkout coordinator: turns selected cart lines into an order.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use domain::{Address, Aggregate, CartService, DomainEvent, InventoryOracle};
use event_store::{AppendOptions, EventEnvelope, EventStore, Version};
use projections::ProjectionProcessor;

use crate::aggregate::CheckoutSaga;
use crate::checkout::{
    CANCEL_REASON_UNPAID, CheckoutConfig, OrderReceipt, STEP_ORDER_CREATED, STEP_VALIDATED,
    checkout_id, chrono_duration,
};
use crate::error::{Result, SagaError};
use crate::events::{CheckoutEvent, CheckoutLine, LockedLine};
use crate::services::{
    CancelOutcome, OrderLedger, OrderRequest, OrderRequestItem, PaymentLookup, Reservation,
    ReservationLine, StockReservations,
};
use crate::unpaid::UnpaidCheckoutIndex;

/// What one run of [`CheckoutCoordinator::sweep_unpaid`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Overdue checkouts that turned out to have a payment.
    pub linked: usize,
    /// Orders cancelled for lack of payment.
    pub compensated: usize,
    /// Orders that had already left `pending` and were left alone.
    pub closed: usize,
    /// Checkouts that could not be settled this run and will be retried.
    pub errors: usize,
}

enum SweepOutcome {
    NotDue,
    Linked,
    Compensated,
    Closed,
}

/// Drives checkouts as durable `CheckoutSaga` streams.
///
/// Steps: validate prices and reserve stock, create the order once through
/// the [`OrderLedger`], then drop the purchased lines from the cart. Orders
/// whose payment never arrives are cancelled later by
/// [`sweep_unpaid`](Self::sweep_unpaid).
pub struct CheckoutCoordinator<S: EventStore> {
    store: S,
    carts: CartService<S>,
    catalog: Arc<dyn InventoryOracle>,
    reservations: Arc<dyn StockReservations>,
    ledger: Arc<dyn OrderLedger>,
    payments: Arc<dyn PaymentLookup>,
    unpaid: UnpaidCheckoutIndex,
    unpaid_processor: ProjectionProcessor<S>,
    config: CheckoutConfig,
}

impl<S: EventStore + Clone> CheckoutCoordinator<S> {
    pub fn new(
        store: S,
        catalog: Arc<dyn InventoryOracle>,
        reservations: Arc<dyn StockReservations>,
        ledger: Arc<dyn OrderLedger>,
        payments: Arc<dyn PaymentLookup>,
    ) -> Self {
        let carts = CartService::new(store.clone(), Arc::clone(&catalog));
        let unpaid = UnpaidCheckoutIndex::new();
        let mut unpaid_processor = ProjectionProcessor::new(store.clone());
        unpaid_processor.register(Box::new(unpaid.clone()));
        Self {
            store,
            carts,
            catalog,
            reservations,
            ledger,
            payments,
            unpaid,
            unpaid_processor,
            config: CheckoutConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CheckoutConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    /// Checks out the user's selected cart lines.
    ///
    /// Nothing is retried. When this returns an error no order exists,
    /// except when the failure came after the ledger accepted the order, in
    /// which case the order is returned instead of the error.
    #[tracing::instrument(skip(self, shipping_address))]
    pub async fn checkout(
        &self,
        user_id: UserId,
        shipping_address: Option<Address>,
    ) -> Result<OrderReceipt> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = Instant::now();

        let result = self.run_checkout(user_id, shipping_address).await;

        match &result {
            Ok(receipt) => {
                metrics::counter!("checkout_completed_total").increment(1);
                metrics::histogram!("checkout_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    order_id = %receipt.order_id,
                    total = %receipt.total_amount,
                    "checkout completed"
                );
            }
            Err(e) => {
                metrics::counter!("checkout_failed_total", "reason" => e.reason()).increment(1);
                tracing::warn!(error = %e, "checkout failed");
            }
        }
        result
    }

    async fn run_checkout(
        &self,
        user_id: UserId,
        shipping_address: Option<Address>,
    ) -> Result<OrderReceipt> {
        let cart = self.carts.get_cart(user_id).await?;
        let lines: Vec<CheckoutLine> = cart
            .selected_lines()
            .into_iter()
            .map(|line| CheckoutLine {
                product_id: line.product_id.clone(),
                name: line.name.clone(),
                quantity: line.quantity,
            })
            .collect();
        if lines.is_empty() {
            return Err(SagaError::NoItemsSelected);
        }

        let order_id = AggregateId::new();
        let saga_id = checkout_id(order_id);
        let mut saga = CheckoutSaga::default();
        let events = saga.start(saga_id, order_id, user_id, lines, shipping_address)?;
        self.record(saga_id, &mut saga, events).await?;

        // validated
        let (reservation, locked) = match self.validate(order_id, saga.lines()).await {
            Ok(validated) => validated,
            Err(e) => {
                self.record_failure(saga_id, &mut saga, STEP_VALIDATED, &e)
                    .await;
                return Err(e);
            }
        };
        let event = CheckoutEvent::validated(reservation.reservation_id.clone(), locked.clone());
        if let Err(e) = self.record(saga_id, &mut saga, vec![event]).await {
            self.reservations.release(&reservation.reservation_id).await;
            return Err(e);
        }

        // order_created
        let request = OrderRequest {
            order_id,
            user_id,
            items: locked
                .iter()
                .map(|line| OrderRequestItem {
                    product_id: line.product_id.clone(),
                    name: line.name.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                })
                .collect(),
            shipping_address: saga.shipping_address().cloned(),
        };
        let receipt = match self.ledger.create_order(&request).await {
            Ok(receipt) => receipt,
            Err(e) => {
                self.reservations.release(&reservation.reservation_id).await;
                self.record_failure(saga_id, &mut saga, STEP_ORDER_CREATED, &e)
                    .await;
                return Err(e);
            }
        };
        self.reservations.consume(&reservation.reservation_id).await;

        let deadline = Utc::now()
            .checked_add_signed(chrono_duration(self.config.payment_deadline))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let event = CheckoutEvent::order_created(receipt.total_amount, deadline);
        if let Err(e) = self.record(saga_id, &mut saga, vec![event]).await {
            // The order is durable; only the unpaid sweep loses track of it.
            tracing::warn!(%saga_id, %order_id, error = %e, "failed to record order creation");
        }

        let purchased = request.items.into_iter().map(|i| i.product_id).collect();
        if let Err(e) = self.carts.remove_purchased(user_id, order_id, purchased).await {
            tracing::warn!(%order_id, error = %e, "failed to remove purchased lines from cart");
        }

        Ok(receipt)
    }

    /// Prices every line from the catalog and reserves the stock.
    async fn validate(
        &self,
        order_id: AggregateId,
        lines: &[CheckoutLine],
    ) -> Result<(Reservation, Vec<LockedLine>)> {
        let mut holds = Vec::with_capacity(lines.len());
        let mut locked = Vec::with_capacity(lines.len());

        for line in lines {
            let product = self
                .catalog
                .get_product(&line.product_id)
                .await
                .map_err(|e| SagaError::Upstream(e.to_string()))?
                .ok_or_else(|| SagaError::ProductNotFound {
                    product_id: line.product_id.clone(),
                })?;

            if product.stock < line.quantity {
                return Err(SagaError::InsufficientStock {
                    product_id: line.product_id.clone(),
                    requested: line.quantity,
                    available: product.stock,
                });
            }

            holds.push(ReservationLine {
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                stock: product.stock,
            });
            locked.push(LockedLine {
                product_id: line.product_id.clone(),
                name: product.name,
                quantity: line.quantity,
                unit_price: product.price,
            });
        }

        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(chrono_duration(self.config.reservation_ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let reservation = self
            .reservations
            .reserve(order_id, &holds, expires_at, now)
            .await?;
        Ok((reservation, locked))
    }

    /// Links a new payment to the checkout that created `order_id`.
    ///
    /// Returns `None` for orders that did not come from a checkout. Linking
    /// twice, or after the checkout closed, changes nothing.
    #[tracing::instrument(skip(self))]
    pub async fn record_payment(
        &self,
        order_id: AggregateId,
        payment_id: AggregateId,
    ) -> Result<Option<CheckoutSaga>> {
        let saga_id = checkout_id(order_id);
        let Some(mut saga) = self.load_saga(saga_id).await? else {
            return Ok(None);
        };

        let events = saga.link_payment(payment_id);
        if !events.is_empty() {
            self.record(saga_id, &mut saga, events).await?;
            tracing::info!(%saga_id, "payment linked to checkout");
        }
        Ok(Some(saga))
    }

    /// Settles every checkout still waiting for payment past its deadline.
    ///
    /// A checkout whose payment exists is completed. Otherwise its order is
    /// cancelled and the checkout compensated, unless the ledger reports the
    /// order already moved on, in which case it is closed untouched. Failures
    /// are logged and left for the next run.
    ///
    /// Only checkouts in the [`UnpaidCheckoutIndex`] are loaded; the index
    /// reads just the events appended since the previous run.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_unpaid(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for saga_id in self.due_unpaid(now).await? {
            match self.settle_unpaid(saga_id, now).await {
                Ok(SweepOutcome::NotDue) => {}
                Ok(SweepOutcome::Linked) => report.linked += 1,
                Ok(SweepOutcome::Compensated) => report.compensated += 1,
                Ok(SweepOutcome::Closed) => report.closed += 1,
                Err(e) => {
                    report.errors += 1;
                    tracing::warn!(%saga_id, error = %e, "failed to settle unpaid checkout");
                }
            }
        }

        if report != SweepReport::default() {
            tracing::info!(?report, "unpaid sweep finished");
        }
        Ok(report)
    }

    async fn settle_unpaid(&self, saga_id: AggregateId, now: DateTime<Utc>) -> Result<SweepOutcome> {
        let Some(mut saga) = self.load_saga(saga_id).await? else {
            return Ok(SweepOutcome::NotDue);
        };
        if !saga.is_overdue(now) {
            return Ok(SweepOutcome::NotDue);
        }
        let order_id = saga.order_id().ok_or(SagaError::NotFound(saga_id))?;

        if let Some(payment_id) = self.payments.payment_for_order(order_id).await? {
            let events = saga.link_payment(payment_id);
            self.record(saga_id, &mut saga, events).await?;
            return Ok(SweepOutcome::Linked);
        }

        match self.ledger.cancel_order(order_id, CANCEL_REASON_UNPAID).await? {
            CancelOutcome::Cancelled => {
                let event = CheckoutEvent::checkout_compensated(CANCEL_REASON_UNPAID);
                self.record(saga_id, &mut saga, vec![event]).await?;
                metrics::counter!("unpaid_orders_cancelled_total").increment(1);
                tracing::info!(%saga_id, %order_id, "unpaid order cancelled");
                Ok(SweepOutcome::Compensated)
            }
            CancelOutcome::NotPending(observed) => {
                let note = format!("order no longer pending: {observed}");
                let event = CheckoutEvent::checkout_completed(note);
                self.record(saga_id, &mut saga, vec![event]).await?;
                tracing::info!(%saga_id, %order_id, "unpaid order already moved on");
                Ok(SweepOutcome::Closed)
            }
        }
    }

    /// Checkouts awaiting payment with a deadline at or before `now`.
    pub async fn due_unpaid(&self, now: DateTime<Utc>) -> Result<Vec<AggregateId>> {
        self.unpaid_processor.run_catch_up().await?;
        Ok(self.unpaid.due(now).await)
    }

    /// Drops stock reservations past their expiry.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let purged = self.reservations.purge_expired(now).await;
        if purged > 0 {
            metrics::counter!("reservations_expired_total").increment(purged as u64);
            tracing::info!(purged, "expired reservations purged");
        }
        purged
    }

    pub async fn get_saga(&self, saga_id: AggregateId) -> Result<Option<CheckoutSaga>> {
        self.load_saga(saga_id).await
    }

    /// The checkout that created `order_id`, if any.
    pub async fn find_by_order(&self, order_id: AggregateId) -> Result<Option<CheckoutSaga>> {
        self.load_saga(checkout_id(order_id)).await
    }

    async fn load_saga(&self, saga_id: AggregateId) -> Result<Option<CheckoutSaga>> {
        let events = self.store.get_events_for_aggregate(saga_id).await?;
        if events.is_empty() {
            return Ok(None);
        }

        let mut saga = CheckoutSaga::default();
        for envelope in events {
            let event: CheckoutEvent = envelope.decode()?;
            saga.apply(event);
            saga.set_version(envelope.version);
        }
        Ok(Some(saga))
    }

    async fn record_failure(
        &self,
        saga_id: AggregateId,
        saga: &mut CheckoutSaga,
        step: &str,
        error: &SagaError,
    ) {
        let events = vec![
            CheckoutEvent::step_failed(step, error.to_string()),
            CheckoutEvent::checkout_failed(error.to_string()),
        ];
        if let Err(e) = self.record(saga_id, saga, events).await {
            tracing::warn!(%saga_id, step, error = %e, "failed to record checkout failure");
        }
    }

    /// Appends saga events against the version the saga was loaded at.
    async fn record(
        &self,
        saga_id: AggregateId,
        saga: &mut CheckoutSaga,
        events: Vec<CheckoutEvent>,
    ) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let current_version = saga.version();
        let mut version = current_version;
        let mut envelopes = Vec::with_capacity(events.len());
        for event in &events {
            version = version.next();
            envelopes.push(
                EventEnvelope::builder()
                    .event_type(event.event_type())
                    .aggregate_id(saga_id)
                    .aggregate_type(CheckoutSaga::aggregate_type())
                    .version(version)
                    .payload(event)?
                    .build()?,
            );
        }

        let options = if current_version == Version::initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_version(current_version)
        };
        let new_version = self.store.append(envelopes, options).await?;

        saga.apply_events(events);
        saga.set_version(new_version);
        Ok(())
    }
}
