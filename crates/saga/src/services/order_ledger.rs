//! Order Ledger adapters used by checkout.
//!
//! Checkout only needs two things from the ledger: create an order under an
//! id it chose, and cancel that order if payment never arrives. The local
//! adapter calls [`OrderService`] in-process; the HTTP adapter talks to a
//! ledger running as its own service.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{AggregateId, UserId};
use domain::{
    Address, CancelOrder, DomainError, Money, NewOrderItem, OrderError, OrderService, OrderStatus,
    OrderView, PlaceOrder, ProductId,
};
use event_store::EventStore;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::checkout::OrderReceipt;
use crate::error::SagaError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequestItem {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Order creation request sent by checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub order_id: AggregateId,
    pub user_id: UserId,
    pub items: Vec<OrderRequestItem>,
    pub shipping_address: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    /// The order left `pending` first, e.g. it was paid. Carries the
    /// ledger's explanation.
    NotPending(String),
}

#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Creates the order. An order with the same id already present is a
    /// [`SagaError::Conflict`].
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderReceipt, SagaError>;

    async fn cancel_order(
        &self,
        order_id: AggregateId,
        reason: &str,
    ) -> Result<CancelOutcome, SagaError>;
}

/// Ledger in the same process, over the same event store.
pub struct LocalOrderLedger<S: EventStore> {
    orders: Arc<OrderService<S>>,
}

impl<S: EventStore> LocalOrderLedger<S> {
    pub fn new(orders: Arc<OrderService<S>>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl<S: EventStore> OrderLedger for LocalOrderLedger<S> {
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderReceipt, SagaError> {
        let items = request
            .items
            .iter()
            .map(|item| NewOrderItem {
                product_id: item.product_id.clone(),
                name: item.name.clone(),
                quantity: i64::from(item.quantity),
                unit_price: item.unit_price,
            })
            .collect();
        let cmd = PlaceOrder::new(request.user_id, items)
            .with_id(request.order_id)
            .with_address(request.shipping_address.clone());

        match self.orders.place_order(cmd).await {
            Ok(order) => order
                .to_view()
                .map(|view| OrderReceipt::from(&view))
                .ok_or(SagaError::NotFound(request.order_id)),
            Err(e) if e.is_conflict() => Err(SagaError::Conflict(e.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn cancel_order(
        &self,
        order_id: AggregateId,
        reason: &str,
    ) -> Result<CancelOutcome, SagaError> {
        let cmd = CancelOrder::new(order_id, Some(reason.to_string()));
        match self.orders.cancel_order(cmd).await {
            Ok(_) => Ok(CancelOutcome::Cancelled),
            Err(DomainError::Order(e @ OrderError::InvalidOrderState { .. })) => {
                Ok(CancelOutcome::NotPending(e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct CancelBody<'a> {
    reason: &'a str,
}

/// Ledger reached over HTTP at `POST {base}/orders`.
#[derive(Debug, Clone)]
pub struct HttpOrderLedger {
    client: Client,
    base_url: String,
}

impl HttpOrderLedger {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SagaError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SagaError::Upstream(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => format!("unexpected status {status}"),
    }
}

#[async_trait]
impl OrderLedger for HttpOrderLedger {
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderReceipt, SagaError> {
        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .header("X-User-Id", request.user_id.to_string())
            .json(request)
            .send()
            .await
            .map_err(|e| SagaError::Upstream(e.to_string()))?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let view: OrderView = response
                    .json()
                    .await
                    .map_err(|e| SagaError::Upstream(e.to_string()))?;
                Ok(OrderReceipt::from(&view))
            }
            StatusCode::CONFLICT => Err(SagaError::Conflict(error_message(response).await)),
            _ => Err(SagaError::Upstream(error_message(response).await)),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_order(
        &self,
        order_id: AggregateId,
        reason: &str,
    ) -> Result<CancelOutcome, SagaError> {
        let response = self
            .client
            .post(format!("{}/orders/{}/cancel", self.base_url, order_id))
            .json(&CancelBody { reason })
            .send()
            .await
            .map_err(|e| SagaError::Upstream(e.to_string()))?;

        match response.status() {
            StatusCode::OK => Ok(CancelOutcome::Cancelled),
            StatusCode::BAD_REQUEST => Ok(CancelOutcome::NotPending(error_message(response).await)),
            StatusCode::NOT_FOUND => Err(SagaError::NotFound(order_id)),
            _ => Err(SagaError::Upstream(error_message(response).await)),
        }
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    orders: HashMap<AggregateId, OrderRequest>,
    cancelled: Vec<AggregateId>,
    not_pending: Vec<AggregateId>,
    create_calls: usize,
    fail_on_create: bool,
    fail_on_cancel: bool,
}

/// In-memory ledger for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryOrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.write().await.fail_on_create = fail;
    }

    pub async fn set_fail_on_cancel(&self, fail: bool) {
        self.state.write().await.fail_on_cancel = fail;
    }

    /// Makes later cancels of `order_id` report the order as no longer
    /// pending.
    pub async fn mark_not_pending(&self, order_id: AggregateId) {
        self.state.write().await.not_pending.push(order_id);
    }

    pub async fn create_calls(&self) -> usize {
        self.state.read().await.create_calls
    }

    pub async fn order(&self, order_id: AggregateId) -> Option<OrderRequest> {
        self.state.read().await.orders.get(&order_id).cloned()
    }

    pub async fn cancelled(&self) -> Vec<AggregateId> {
        self.state.read().await.cancelled.clone()
    }
}

#[async_trait]
impl OrderLedger for InMemoryOrderLedger {
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderReceipt, SagaError> {
        let mut state = self.state.write().await;
        state.create_calls += 1;

        if state.fail_on_create {
            return Err(SagaError::Upstream("order ledger unavailable".to_string()));
        }
        if state.orders.contains_key(&request.order_id) {
            return Err(SagaError::Conflict(format!(
                "order already exists: {}",
                request.order_id
            )));
        }

        let total_amount = request
            .items
            .iter()
            .map(|i| i.unit_price.multiply(i.quantity))
            .collect::<Option<Vec<_>>>()
            .and_then(Money::checked_sum)
            .ok_or(SagaError::Domain(DomainError::Order(OrderError::AmountOverflow)))?;

        state.orders.insert(request.order_id, request.clone());
        Ok(OrderReceipt {
            order_id: request.order_id,
            total_amount,
            status: OrderStatus::Pending,
            created_at: chrono::Utc::now(),
        })
    }

    async fn cancel_order(
        &self,
        order_id: AggregateId,
        _reason: &str,
    ) -> Result<CancelOutcome, SagaError> {
        let mut state = self.state.write().await;
        if state.fail_on_cancel {
            return Err(SagaError::Upstream("order ledger unavailable".to_string()));
        }
        if !state.orders.contains_key(&order_id) {
            return Err(SagaError::NotFound(order_id));
        }
        if state.not_pending.contains(&order_id) {
            return Ok(CancelOutcome::NotPending(format!(
                "order {order_id} is no longer pending"
            )));
        }
        state.cancelled.push(order_id);
        Ok(CancelOutcome::Cancelled)
    }
}
