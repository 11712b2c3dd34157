//! Order Ledger endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{AggregateId, UserId};
use domain::{
    Address, CancelOrder, Money, NewOrderItem, OrderStatus, OrderView, PlaceOrder, ProductId,
    UpdateOrder,
};
use event_store::EventStore;
use projections::{OrderPage, PageRequest};
use serde::Deserialize;

use crate::error::{ApiError, Result};
use crate::extract::{AuthenticatedUser, JsonBody, optional_body};
use crate::routes::parse_aggregate_id;
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// Idempotency key; a repeat is rejected with 409.
    pub order_id: Option<AggregateId>,
    /// Service callers place orders on a user's behalf.
    pub user_id: Option<UserId>,
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: Option<Address>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub status: Option<String>,
    pub shipping_address: Option<Address>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

fn parse_status(status: &str) -> Result<OrderStatus> {
    status
        .parse()
        .map_err(|e: domain::order::ParseStatusError| ApiError::BadRequest(e.to_string()))
}

fn view(order: &domain::Order) -> Result<OrderView> {
    order
        .to_view()
        .ok_or_else(|| ApiError::Internal("order has no state".to_string()))
}

// -- Handlers --

/// POST /orders
#[tracing::instrument(skip(state, caller, req))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Option<AuthenticatedUser>,
    JsonBody(req): JsonBody<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderView>)> {
    let user_id = req
        .user_id
        .or(caller.map(|c| c.0))
        .ok_or_else(|| ApiError::Unauthorized("missing X-User-Id header".to_string()))?;

    let items = req
        .items
        .into_iter()
        .map(|item| NewOrderItem {
            product_id: item.product_id,
            name: item.name,
            quantity: item.quantity,
            unit_price: item.unit_price,
        })
        .collect();

    let mut cmd = PlaceOrder::new(user_id, items).with_address(req.shipping_address);
    if let Some(order_id) = req.order_id {
        cmd = cmd.with_id(order_id);
    }

    let order = state.orders.place_order(cmd).await?;
    Ok((StatusCode::CREATED, Json(view(&order)?)))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderView>> {
    let order_id = parse_aggregate_id(&id)?;
    let order = state
        .orders
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order not found: {id}")))?;
    Ok(Json(view(&order)?))
}

/// PUT /orders/{id}
#[tracing::instrument(skip(state, req))]
pub async fn update<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateOrderRequest>,
) -> Result<Json<OrderView>> {
    let order_id = parse_aggregate_id(&id)?;
    let status = req.status.as_deref().map(parse_status).transpose()?;

    let order = state
        .orders
        .update_order(UpdateOrder {
            order_id,
            status,
            shipping_address: req.shipping_address,
        })
        .await?;
    Ok(Json(view(&order)?))
}

/// POST /orders/{id}/cancel
#[tracing::instrument(skip(state, body))]
pub async fn cancel<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<OrderView>> {
    let order_id = parse_aggregate_id(&id)?;
    let req: CancelOrderRequest = optional_body(&body)?;

    let order = state
        .orders
        .cancel_order(CancelOrder::new(order_id, req.reason))
        .await?;
    Ok(Json(view(&order)?))
}

/// GET /orders?status=&page=&limit=
///
/// Filters by status when given, otherwise lists the caller's orders. With
/// neither a status nor a caller it lists every order.
#[tracing::instrument(skip(state, caller))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Option<AuthenticatedUser>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<OrderPage>> {
    let page = PageRequest::new(query.page, query.limit);
    let status = query.status.as_deref().map(parse_status).transpose()?;

    state.catch_up().await?;

    let orders = match (status, caller) {
        (Some(status), _) => state.order_summaries.by_status(status, page).await,
        (None, Some(AuthenticatedUser(user_id))) => {
            state.order_summaries.by_user(user_id, page).await
        }
        (None, None) => state.order_summaries.all(page).await,
    };
    Ok(Json(orders))
}
