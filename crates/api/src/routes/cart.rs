//! Cart Store endpoints. Every route acts on the caller's own cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{CartSummary, ProductId};
use event_store::EventStore;
use serde::Deserialize;

use crate::error::Result;
use crate::extract::{AuthenticatedUser, JsonBody};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectItemsRequest {
    pub product_ids: Vec<ProductId>,
}

/// GET /cart
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<CartSummary>> {
    let cart = state.carts.get_cart(user_id).await?;
    Ok(Json(cart.summary()))
}

/// POST /cart/items
#[tracing::instrument(skip(state, req))]
pub async fn add_item<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    JsonBody(req): JsonBody<CartItemRequest>,
) -> Result<Json<CartSummary>> {
    let cart = state
        .carts
        .add_item(user_id, req.product_id, req.quantity)
        .await?;
    Ok(Json(cart.summary()))
}

/// PUT /cart/items
#[tracing::instrument(skip(state, req))]
pub async fn update_item<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    JsonBody(req): JsonBody<CartItemRequest>,
) -> Result<Json<CartSummary>> {
    let cart = state
        .carts
        .update_quantity(user_id, req.product_id, req.quantity)
        .await?;
    Ok(Json(cart.summary()))
}

/// DELETE /cart/items/{productId}
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(product_id): Path<String>,
) -> Result<Json<CartSummary>> {
    let cart = state
        .carts
        .remove_item(user_id, ProductId::new(product_id))
        .await?;
    Ok(Json(cart.summary()))
}

/// POST /cart/select
#[tracing::instrument(skip(state, req))]
pub async fn select<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    JsonBody(req): JsonBody<SelectItemsRequest>,
) -> Result<Json<CartSummary>> {
    let cart = state.carts.select_items(user_id, req.product_ids).await?;
    Ok(Json(cart.summary()))
}

/// DELETE /cart
#[tracing::instrument(skip(state))]
pub async fn clear<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<StatusCode> {
    state.carts.clear_cart(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
