//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

use crate::cart::CartError;
use crate::catalog::CatalogError;
use crate::order::OrderError;
use crate::payment::PaymentError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("{aggregate_type} not found: {aggregate_id}")]
    NotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    /// The request was malformed before any state was consulted.
    #[error("{0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn not_found(aggregate_type: &'static str, aggregate_id: impl ToString) -> Self {
        DomainError::NotFound {
            aggregate_type,
            aggregate_id: aggregate_id.to_string(),
        }
    }

    /// True when a concurrent writer moved the stream first.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. })
                | DomainError::Order(OrderError::AlreadyExists { .. })
                | DomainError::Payment(PaymentError::AlreadyExists { .. })
        )
    }
}
