//! Payment Processor endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{AggregateId, UserId};
use domain::{CreatePayment, Money, Payment, PaymentMethod, PaymentView, RefundPayment};
use event_store::EventStore;
use projections::{PageRequest, PaymentPage};
use serde::Deserialize;

use crate::error::{ApiError, Result};
use crate::extract::{AuthenticatedUser, JsonBody};
use crate::routes::parse_aggregate_id;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub order_id: AggregateId,
    pub user_id: Option<UserId>,
    pub amount: Money,
    pub currency: String,
    pub method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub payment_id: AggregateId,
    pub amount: Money,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ListPaymentsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

fn view(payment: &Payment) -> Result<PaymentView> {
    payment
        .to_view()
        .ok_or_else(|| ApiError::Internal("payment has no state".to_string()))
}

/// POST /payments
///
/// Also links the payment to the checkout that created the order, so the
/// order is not cancelled as unpaid.
#[tracing::instrument(skip(state, caller, req), fields(order_id = %req.order_id))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Option<AuthenticatedUser>,
    JsonBody(req): JsonBody<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentView>)> {
    let user_id = req
        .user_id
        .or(caller.map(|c| c.0))
        .ok_or_else(|| ApiError::Unauthorized("missing X-User-Id header".to_string()))?;

    let cmd = CreatePayment::new(req.order_id, user_id, req.amount, req.currency, req.method);
    let payment = state.payments.create_payment(cmd).await?;
    let payment_view = view(&payment)?;

    if let Err(e) = state
        .checkout
        .record_payment(payment_view.order_id, payment_view.id)
        .await
    {
        // The sweep finds the payment through the projection later.
        tracing::warn!(payment_id = %payment_view.id, error = %e, "failed to link payment to checkout");
    }

    Ok((StatusCode::CREATED, Json(payment_view)))
}

/// GET /payments/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<PaymentView>> {
    let payment_id = parse_aggregate_id(&id)?;
    let payment = state
        .payments
        .get_payment(payment_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("payment not found: {id}")))?;
    Ok(Json(view(&payment)?))
}

/// GET /payments/order/{orderId}
#[tracing::instrument(skip(state))]
pub async fn by_order<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<String>,
) -> Result<Json<PaymentView>> {
    let order = parse_aggregate_id(&order_id)?;
    state.catch_up().await?;
    state
        .payment_ledger
        .by_order(order)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no payment for order {order_id}")))
}

/// GET /payments?page=&limit=
///
/// The caller's payments, or every payment when no caller is given.
#[tracing::instrument(skip(state, caller))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Option<AuthenticatedUser>,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<Json<PaymentPage>> {
    let page = PageRequest::new(query.page, query.limit);
    state.catch_up().await?;

    let payments = match caller {
        Some(AuthenticatedUser(user_id)) => state.payment_ledger.by_user(user_id, page).await,
        None => state.payment_ledger.all(page).await,
    };
    Ok(Json(payments))
}

/// POST /payments/{id}/process
#[tracing::instrument(skip(state))]
pub async fn process<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<PaymentView>> {
    let payment_id = parse_aggregate_id(&id)?;
    let payment = state.payments.process_payment(payment_id).await?;
    Ok(Json(view(&payment)?))
}

/// POST /payments/{id}/cancel
#[tracing::instrument(skip(state))]
pub async fn cancel<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<PaymentView>> {
    let payment_id = parse_aggregate_id(&id)?;
    let payment = state.payments.cancel_payment(payment_id).await?;
    Ok(Json(view(&payment)?))
}

/// POST /payments/refund
#[tracing::instrument(skip(state, req), fields(payment_id = %req.payment_id))]
pub async fn refund<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    JsonBody(req): JsonBody<RefundRequest>,
) -> Result<Json<PaymentView>> {
    let payment = state
        .payments
        .refund_payment(RefundPayment::new(req.payment_id, req.amount, req.reason))
        .await?;
    Ok(Json(view(&payment)?))
}
