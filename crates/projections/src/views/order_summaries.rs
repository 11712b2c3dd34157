//! Orders by user and by status, newest first.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, UserId};
use domain::{Aggregate, Order, OrderEvent, OrderStatus, OrderView};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::{Page, PageRequest, ReadModel};

/// Paginated order listing as served to clients.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<OrderView>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
}

impl From<Page<OrderView>> for OrderPage {
    fn from(page: Page<OrderView>) -> Self {
        Self {
            orders: page.items,
            total: page.total,
            page: page.page,
            limit: page.limit,
        }
    }
}

struct Entry {
    /// Placement order; higher is newer.
    seq: u64,
    order: Order,
}

#[derive(Default)]
struct OrderSummaryState {
    orders: HashMap<AggregateId, Entry>,
    next_seq: u64,
    position: ProjectionPosition,
}

impl OrderSummaryState {
    fn newest_first(&self, keep: impl Fn(&Order) -> bool) -> Vec<OrderView> {
        let mut matching: Vec<&Entry> = self.orders.values().filter(|e| keep(&e.order)).collect();
        matching.sort_by(|a, b| b.seq.cmp(&a.seq));
        matching
            .into_iter()
            .filter_map(|e| e.order.to_view())
            .collect()
    }
}

/// Folds `Order` streams into listable views.
#[derive(Clone, Default)]
pub struct OrderSummaryView {
    state: Arc<RwLock<OrderSummaryState>>,
}

impl OrderSummaryView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, order_id: AggregateId) -> Option<OrderView> {
        let state = self.state.read().await;
        state.orders.get(&order_id).and_then(|e| e.order.to_view())
    }

    pub async fn by_user(&self, user_id: UserId, page: PageRequest) -> OrderPage {
        let state = self.state.read().await;
        page.apply(state.newest_first(|o| o.user_id() == Some(user_id)))
            .into()
    }

    pub async fn by_status(&self, status: OrderStatus, page: PageRequest) -> OrderPage {
        let state = self.state.read().await;
        page.apply(state.newest_first(|o| o.status() == status))
            .into()
    }

    pub async fn all(&self, page: PageRequest) -> OrderPage {
        let state = self.state.read().await;
        page.apply(state.newest_first(|_| true)).into()
    }
}

#[async_trait]
impl Projection for OrderSummaryView {
    fn name(&self) -> &'static str {
        "OrderSummaryView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;
        state.position = state.position.advance_to(event.position);

        if event.aggregate_type != Order::aggregate_type() {
            return Ok(());
        }

        let order_event: OrderEvent = event.decode()?;
        let placed = matches!(order_event, OrderEvent::OrderPlaced(_));

        if placed && !state.orders.contains_key(&event.aggregate_id) {
            state.next_seq += 1;
            let seq = state.next_seq;
            state.orders.insert(
                event.aggregate_id,
                Entry {
                    seq,
                    order: Order::default(),
                },
            );
        }

        if let Some(entry) = state.orders.get_mut(&event.aggregate_id) {
            entry.order.apply(order_event);
            entry.order.set_version(event.version);
        }
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = OrderSummaryState::default();
        Ok(())
    }
}

impl ReadModel for OrderSummaryView {
    fn name(&self) -> &'static str {
        "OrderSummaryView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.orders.len()).unwrap_or(0)
    }
}
