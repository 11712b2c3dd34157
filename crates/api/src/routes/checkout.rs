//! Checkout and checkout-record endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::Address;
use event_store::EventStore;
use saga::{CheckoutView, OrderReceipt};
use serde::Deserialize;

use crate::error::{ApiError, Result};
use crate::extract::{AuthenticatedUser, optional_body};
use crate::routes::parse_aggregate_id;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub shipping_address: Option<Address>,
}

/// POST /cart/checkout
#[tracing::instrument(skip(state, body))]
pub async fn checkout<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    body: Bytes,
) -> Result<(StatusCode, Json<OrderReceipt>)> {
    let req: CheckoutRequest = optional_body(&body)?;
    let receipt = state
        .checkout
        .checkout(user_id, req.shipping_address)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /checkouts/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<CheckoutView>> {
    let saga_id = parse_aggregate_id(&id)?;
    state
        .checkout
        .get_saga(saga_id)
        .await?
        .and_then(|saga| saga.to_view())
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("checkout not found: {id}")))
}
