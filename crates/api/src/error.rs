//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{CartError, CatalogError, DomainError, OrderError, PaymentError};
use event_store::EventStoreError;
use projections::ProjectionError;
use saga::SagaError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// Missing or malformed caller identity.
    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Saga(#[from] SagaError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Domain(err) => domain_status(err),
            ApiError::Saga(err) => saga_status(err),
            ApiError::Projection(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        metrics::counter!("http_errors_total", "status" => status.as_u16().to_string())
            .increment(1);
        let message = if status.is_server_error() && status != StatusCode::BAD_GATEWAY {
            tracing::error!(error = %self, "internal server error");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Cart(cart_err) => match cart_err {
            CartError::ItemNotFound { .. } | CartError::ProductNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            CartError::InvalidQuantity { .. }
            | CartError::InvalidStock { .. }
            | CartError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
        },
        DomainError::Order(OrderError::AlreadyExists { .. })
        | DomainError::Payment(PaymentError::AlreadyExists { .. }) => StatusCode::CONFLICT,
        DomainError::Order(_) | DomainError::Payment(_) | DomainError::Validation(_) => {
            StatusCode::BAD_REQUEST
        }
        DomainError::Catalog(CatalogError::Unavailable(_)) => StatusCode::BAD_GATEWAY,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::EventStore(err) => store_status(err),
        DomainError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn saga_status(err: &SagaError) -> StatusCode {
    match err {
        SagaError::NoItemsSelected | SagaError::InsufficientStock { .. } => {
            StatusCode::BAD_REQUEST
        }
        SagaError::ProductNotFound { .. } | SagaError::NotFound(_) => StatusCode::NOT_FOUND,
        SagaError::Upstream(_) => StatusCode::BAD_GATEWAY,
        SagaError::Conflict(_) | SagaError::AlreadyStarted => StatusCode::CONFLICT,
        SagaError::Domain(err) => domain_status(err),
        SagaError::EventStore(err) => store_status(err),
        SagaError::Projection(_) | SagaError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn store_status(err: &EventStoreError) -> StatusCode {
    match err {
        EventStoreError::ConcurrencyConflict { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AggregateId;
    use domain::{Money, OrderStatus, PaymentStatus, ProductId};

    #[test]
    fn state_errors_are_bad_requests() {
        let cases = [
            ApiError::from(SagaError::NoItemsSelected),
            ApiError::from(DomainError::Order(OrderError::InvalidOrderState {
                current: OrderStatus::Paid,
                action: "cancel".into(),
            })),
            ApiError::from(DomainError::Payment(PaymentError::InvalidPaymentStatus {
                current: PaymentStatus::Failed,
                action: "refund",
            })),
            ApiError::from(DomainError::Payment(PaymentError::InvalidRefundAmount {
                requested: Money::from_cents(6000),
                remaining: Money::from_cents(5000),
            })),
            ApiError::from(DomainError::Cart(CartError::InvalidStock {
                requested: 9,
                stock: 2,
            })),
        ];
        for err in cases {
            assert_eq!(err.status(), StatusCode::BAD_REQUEST, "{err}");
        }
    }

    #[test]
    fn lookups_and_conflicts() {
        assert_eq!(
            ApiError::from(DomainError::not_found("Order", AggregateId::new())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(SagaError::ProductNotFound {
                product_id: ProductId::new("p9")
            })
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(DomainError::Order(OrderError::AlreadyExists {
                order_id: AggregateId::new()
            }))
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(SagaError::Upstream("timeout".into())).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let response = ApiError::Internal("pool exhausted at db-3".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
