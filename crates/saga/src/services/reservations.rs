//! Time-bounded stock holds taken between validation and order creation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::ProductId;
use tokio::sync::RwLock;

use crate::error::SagaError;

/// One product to hold, with the catalog stock seen during validation.
#[derive(Debug, Clone)]
pub struct ReservationLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub stock: u32,
}

#[derive(Debug, Clone)]
pub struct Reservation {
    pub reservation_id: String,
    pub order_id: AggregateId,
    pub lines: Vec<(ProductId, u32)>,
    pub expires_at: DateTime<Utc>,
}

impl Reservation {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[async_trait]
pub trait StockReservations: Send + Sync {
    /// Holds every line or none of them.
    ///
    /// A line is available when its catalog stock minus what other live
    /// reservations hold covers the quantity.
    async fn reserve(
        &self,
        order_id: AggregateId,
        lines: &[ReservationLine],
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Reservation, SagaError>;

    /// Gives the stock back after a failed checkout.
    async fn release(&self, reservation_id: &str);

    /// Drops the hold once the order exists.
    async fn consume(&self, reservation_id: &str);

    /// Removes reservations past their expiry. Returns how many went.
    async fn purge_expired(&self, now: DateTime<Utc>) -> usize;
}

#[derive(Debug, Default)]
struct ReservationState {
    reservations: HashMap<String, Reservation>,
    next_id: u32,
}

impl ReservationState {
    fn held(&self, product_id: &ProductId, now: DateTime<Utc>) -> u32 {
        self.reservations
            .values()
            .filter(|r| r.is_live(now))
            .flat_map(|r| r.lines.iter())
            .filter(|(id, _)| id == product_id)
            .fold(0u32, |acc, (_, qty)| acc.saturating_add(*qty))
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStockReservations {
    state: Arc<RwLock<ReservationState>>,
}

impl InMemoryStockReservations {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn reservation_count(&self) -> usize {
        self.state.read().await.reservations.len()
    }

    pub async fn has_reservation(&self, reservation_id: &str) -> bool {
        self.state
            .read()
            .await
            .reservations
            .contains_key(reservation_id)
    }

    /// Quantity of `product_id` held by live reservations.
    pub async fn held(&self, product_id: &ProductId, now: DateTime<Utc>) -> u32 {
        self.state.read().await.held(product_id, now)
    }
}

#[async_trait]
impl StockReservations for InMemoryStockReservations {
    async fn reserve(
        &self,
        order_id: AggregateId,
        lines: &[ReservationLine],
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Reservation, SagaError> {
        let mut state = self.state.write().await;

        for line in lines {
            let available = line.stock.saturating_sub(state.held(&line.product_id, now));
            if available < line.quantity {
                return Err(SagaError::InsufficientStock {
                    product_id: line.product_id.clone(),
                    requested: line.quantity,
                    available,
                });
            }
        }

        state.next_id += 1;
        let reservation = Reservation {
            reservation_id: format!("RES-{:04}", state.next_id),
            order_id,
            lines: lines
                .iter()
                .map(|l| (l.product_id.clone(), l.quantity))
                .collect(),
            expires_at,
        };
        state
            .reservations
            .insert(reservation.reservation_id.clone(), reservation.clone());

        Ok(reservation)
    }

    async fn release(&self, reservation_id: &str) {
        self.state.write().await.reservations.remove(reservation_id);
    }

    async fn consume(&self, reservation_id: &str) {
        self.state.write().await.reservations.remove(reservation_id);
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.state.write().await;
        let before = state.reservations.len();
        state.reservations.retain(|_, r| r.is_live(now));
        before - state.reservations.len()
    }
}
